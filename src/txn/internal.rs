// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Internal transaction representation.
//!
//! A [`Txn`] owns the lock context, the undo log, and the state machine a
//! public [`Transaction`](super::Transaction) handle drives. Commit
//! releases locks and discards undo; abort replays undo in reverse so the
//! effect is as if the transaction never ran. A child transaction folds
//! its undo into its parent at commit, which is what lets a parent abort
//! unwind committed children.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::store::Database;

use super::config::TransactionConfig;
use super::durability::Durability;
use super::error::TxnError;
use super::lock_table::{LockKind, LockRequest, LockTable};
use super::TxnId;

/// Lifecycle state of an internal transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxnState {
    Active,
    Committed,
    Aborted,
}

/// One reversible mutation performed under a transaction.
pub(crate) enum UndoRecord {
    /// A single-value put; `prev` is the overwritten value, `None` for a
    /// fresh insert.
    Put {
        db: Database,
        key: Vec<u8>,
        prev: Option<Vec<u8>>,
    },
    /// An insert into a duplicate set.
    DupInsert {
        db: Database,
        key: Vec<u8>,
        data: Vec<u8>,
    },
}

impl UndoRecord {
    fn revert(&self) {
        match self {
            UndoRecord::Put { db, key, prev } => db.revert_put(key, prev.clone()),
            UndoRecord::DupInsert { db, key, data } => db.remove_duplicate(key, data),
        }
    }
}

struct TxnInner {
    state: TxnState,
    only_abortable: bool,
    suspended: bool,
    prepared: bool,
    undo: Vec<UndoRecord>,
    open_cursors: usize,
    children: Vec<Arc<Txn>>,
    lock_timeout: Duration,
    txn_deadline: Option<Instant>,
}

/// The engine-internal transaction object.
pub(crate) struct Txn {
    id: TxnId,
    lock_table: Arc<LockTable>,
    config: TransactionConfig,
    parent: Option<Weak<Txn>>,
    start: Instant,
    inner: Mutex<TxnInner>,
}

impl Txn {
    pub(crate) fn new(
        id: TxnId,
        lock_table: Arc<LockTable>,
        config: TransactionConfig,
        parent: Option<&Arc<Txn>>,
        lock_timeout: Duration,
        txn_timeout: Option<Duration>,
    ) -> Arc<Self> {
        let start = Instant::now();
        let txn = Arc::new(Self {
            id,
            lock_table,
            config,
            parent: parent.map(Arc::downgrade),
            start,
            inner: Mutex::new(TxnInner {
                state: TxnState::Active,
                only_abortable: false,
                suspended: false,
                prepared: false,
                undo: Vec::new(),
                open_cursors: 0,
                children: Vec::new(),
                lock_timeout,
                txn_deadline: txn_timeout.map(|t| start + t),
            }),
        });
        if let Some(parent) = parent {
            parent.inner.lock().children.push(Arc::clone(&txn));
        }
        txn
    }

    #[inline]
    pub(crate) fn id(&self) -> TxnId {
        self.id
    }

    #[inline]
    pub(crate) fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> TxnState {
        self.inner.lock().state
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state() == TxnState::Active
    }

    /// Acquires a lock on behalf of this transaction, honoring its no-wait
    /// flag and its current timeouts.
    pub(crate) fn lock_key(&self, db: u64, key: &[u8], kind: LockKind) -> Result<(), TxnError> {
        let request = {
            let inner = self.inner.lock();
            if inner.state != TxnState::Active {
                return Err(TxnError::Closed { id: self.id });
            }
            LockRequest {
                owner: self.id,
                no_wait: self.config.no_wait(),
                lock_timeout: inner.lock_timeout,
                txn_deadline: inner.txn_deadline,
            }
        };
        self.lock_table.acquire(&request, db, key, kind)
    }

    /// Drops a read lock right after the read, for read-committed
    /// transactions.
    pub(crate) fn release_read_lock(&self, db: u64, key: &[u8]) {
        self.lock_table.release_shared(self.id, db, key);
    }

    pub(crate) fn push_undo(&self, record: UndoRecord) {
        self.inner.lock().undo.push(record);
    }

    pub(crate) fn cursor_opened(&self) {
        self.inner.lock().open_cursors += 1;
    }

    pub(crate) fn cursor_closed(&self) {
        let mut inner = self.inner.lock();
        inner.open_cursors = inner.open_cursors.saturating_sub(1);
    }

    /// Bounds how long this transaction waits for any single lock.
    /// Enforced at lock-wait points only.
    pub(crate) fn set_lock_timeout(&self, timeout: Duration) {
        self.inner.lock().lock_timeout = timeout;
    }

    /// Bounds how long this transaction may stay open. Enforced at
    /// lock-wait points only, so abort latency is bounded by wait wakeups.
    pub(crate) fn set_txn_timeout(&self, timeout: Duration) {
        self.inner.lock().txn_deadline = Some(self.start + timeout);
    }

    pub(crate) fn set_only_abortable(&self) {
        self.inner.lock().only_abortable = true;
    }

    pub(crate) fn only_abortable(&self) -> bool {
        self.inner.lock().only_abortable
    }

    pub(crate) fn set_suspended(&self, suspended: bool) {
        self.inner.lock().suspended = suspended;
    }

    pub(crate) fn suspended(&self) -> bool {
        self.inner.lock().suspended
    }

    pub(crate) fn prepared(&self) -> bool {
        self.inner.lock().prepared
    }

    /// First phase of two-phase commit. Returns `true` when the
    /// transaction made no durable changes, in which case the caller is
    /// expected to commit immediately instead of waiting for phase two.
    pub(crate) fn prepare(&self) -> Result<bool, TxnError> {
        let mut inner = self.inner.lock();
        if inner.state != TxnState::Active {
            return Err(TxnError::Closed { id: self.id });
        }
        if inner.undo.is_empty() {
            return Ok(true);
        }
        inner.prepared = true;
        debug!(id = %self.id, "transaction prepared");
        Ok(false)
    }

    /// Commits this transaction under the given durability.
    ///
    /// On any validation failure the transaction and all of its children
    /// are aborted before the error is returned.
    pub(crate) fn commit(&self, durability: Durability) -> Result<(), TxnError> {
        let undo = {
            let mut inner = self.inner.lock();
            if inner.state != TxnState::Active {
                return Err(TxnError::Closed { id: self.id });
            }
            if inner.only_abortable {
                drop(inner);
                let _ = self.abort();
                return Err(TxnError::AbortOnly { id: self.id });
            }
            if inner.open_cursors > 0 {
                let count = inner.open_cursors;
                drop(inner);
                let _ = self.abort();
                return Err(TxnError::CursorsOpen { id: self.id, count });
            }
            if inner.children.iter().any(|c| c.is_active()) {
                drop(inner);
                let _ = self.abort();
                return Err(TxnError::UnresolvedChildren { id: self.id });
            }
            inner.state = TxnState::Committed;
            inner.children.clear();
            std::mem::take(&mut inner.undo)
        };

        match self.parent.as_ref().and_then(Weak::upgrade) {
            Some(parent) => {
                // A child commit is provisional: its effects stay undoable
                // through the parent until the parent itself resolves.
                parent.adopt_undo(undo);
                debug!(id = %self.id, parent = %parent.id, "child transaction committed");
            }
            None => {
                // The log collaborator flushes the commit record per the
                // resolved policy.
                debug!(
                    id = %self.id,
                    policy = ?durability.local_sync(),
                    writes = undo.len(),
                    "transaction committed"
                );
            }
        }
        self.lock_table.release_all(self.id);
        Ok(())
    }

    /// Aborts this transaction: unresolved children first, then its own
    /// undo in reverse order, then every lock it holds.
    pub(crate) fn abort(&self) -> Result<(), TxnError> {
        let (undo, children) = {
            let mut inner = self.inner.lock();
            if inner.state != TxnState::Active {
                return Err(TxnError::Closed { id: self.id });
            }
            inner.state = TxnState::Aborted;
            inner.open_cursors = 0;
            (
                std::mem::take(&mut inner.undo),
                std::mem::take(&mut inner.children),
            )
        };

        for child in &children {
            // Already-resolved children folded their undo into ours.
            let _ = child.abort();
        }
        for record in undo.iter().rev() {
            record.revert();
        }
        self.lock_table.release_all(self.id);
        debug!(id = %self.id, reverted = undo.len(), "transaction aborted");
        Ok(())
    }

    fn adopt_undo(&self, undo: Vec<UndoRecord>) {
        self.inner.lock().undo.extend(undo);
    }
}

impl std::fmt::Debug for Txn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Txn")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
