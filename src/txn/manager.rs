// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction manager: id allocation, the shared lock table, and the XA
//! registry.
//!
//! The XA binding table maps global transaction ids to internal
//! transactions, with a per-worker-thread slot tracking which transaction
//! a worker is currently associated with. Both live here, owned by the
//! environment, so their lifecycle ends with it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;

use crate::xa::Xid;

use super::config::TransactionConfig;
use super::internal::Txn;
use super::lock_table::LockTable;
use super::TxnId;

pub(crate) struct TxnManager {
    next_id: AtomicU64,
    lock_table: Arc<LockTable>,
    xa_bindings: Mutex<HashMap<Xid, Arc<Txn>>>,
    thread_txns: Mutex<HashMap<ThreadId, Arc<Txn>>>,
}

impl TxnManager {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            lock_table: Arc::new(LockTable::new()),
            xa_bindings: Mutex::new(HashMap::new()),
            thread_txns: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates an id and creates an internal transaction.
    pub(crate) fn begin(
        &self,
        config: TransactionConfig,
        parent: Option<&Arc<Txn>>,
        lock_timeout: Duration,
        txn_timeout: Option<Duration>,
    ) -> Arc<Txn> {
        let id = TxnId(self.next_id.fetch_add(1, Ordering::Relaxed));
        Txn::new(
            id,
            Arc::clone(&self.lock_table),
            config,
            parent,
            lock_timeout,
            txn_timeout,
        )
    }

    /// Binds `xid` to `txn`. Returns false if the xid is already bound.
    pub(crate) fn register_xa(&self, xid: Xid, txn: Arc<Txn>) -> bool {
        let mut bindings = self.xa_bindings.lock();
        if bindings.contains_key(&xid) {
            return false;
        }
        bindings.insert(xid, txn);
        true
    }

    pub(crate) fn xa_txn(&self, xid: &Xid) -> Option<Arc<Txn>> {
        self.xa_bindings.lock().get(xid).cloned()
    }

    pub(crate) fn unregister_xa(&self, xid: &Xid) {
        self.xa_bindings.lock().remove(xid);
        // Drop any worker association still pointing at the binding.
        let mut threads = self.thread_txns.lock();
        threads.retain(|_, txn| txn.is_active());
    }

    /// All bindings eligible for recovery: prepared but unresolved.
    pub(crate) fn xa_recover(&self) -> Vec<Xid> {
        self.xa_bindings
            .lock()
            .iter()
            .filter(|(_, txn)| txn.prepared() && txn.is_active())
            .map(|(xid, _)| xid.clone())
            .collect()
    }

    /// Associates the calling worker with `txn`.
    pub(crate) fn set_thread_txn(&self, txn: Arc<Txn>) {
        self.thread_txns
            .lock()
            .insert(std::thread::current().id(), txn);
    }

    /// Clears and returns the calling worker's association, if any.
    pub(crate) fn unset_thread_txn(&self) -> Option<Arc<Txn>> {
        self.thread_txns
            .lock()
            .remove(&std::thread::current().id())
    }

    pub(crate) fn thread_txn(&self) -> Option<Arc<Txn>> {
        self.thread_txns
            .lock()
            .get(&std::thread::current().id())
            .cloned()
    }
}
