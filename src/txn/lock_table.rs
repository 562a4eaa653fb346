// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Blocking shared/exclusive lock table.
//!
//! Keys are `(database id, record key)` pairs. The table is sharded to
//! reduce contention; each shard pairs a mutex-protected map with a
//! condvar that waiters park on. Lock waits observe the requester's
//! lock timeout and transaction deadline, so timeout enforcement happens
//! at wait points only. Full deadlock detection belongs to an external
//! detector; the table itself only resolves the classic two-upgrader
//! cycle, which it can see locally.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::error::TxnError;
use super::TxnId;

const NUM_SHARDS: usize = 64;

/// Lock modes tracked by the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockKind {
    /// Multiple readers may hold the lock together.
    Shared,
    /// A single writer excludes all other holders.
    Exclusive,
}

/// Parameters of one acquire call, snapshot from the requesting
/// transaction.
#[derive(Debug, Clone)]
pub(crate) struct LockRequest {
    pub owner: TxnId,
    pub no_wait: bool,
    pub lock_timeout: Duration,
    pub txn_deadline: Option<Instant>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct LockKey {
    db: u64,
    key: Vec<u8>,
}

struct LockEntry {
    holders: Vec<(TxnId, LockKind)>,
    /// A shared holder waiting to upgrade. Only one may wait; a second
    /// concurrent upgrader is a deadlock by construction.
    upgrade_waiter: Option<TxnId>,
}

impl LockEntry {
    fn new() -> Self {
        Self {
            holders: Vec::new(),
            upgrade_waiter: None,
        }
    }

    /// Attempts to grant `kind` to `owner`, mutating the entry on success.
    fn try_grant(&mut self, owner: TxnId, kind: LockKind) -> bool {
        if let Some(i) = self.holders.iter().position(|(o, _)| *o == owner) {
            let held = self.holders[i].1;
            if held == LockKind::Exclusive || kind == LockKind::Shared {
                return true;
            }
            // Upgrade: only possible while we are the sole holder.
            if self.holders.len() == 1 {
                self.holders[i].1 = LockKind::Exclusive;
                if self.upgrade_waiter == Some(owner) {
                    self.upgrade_waiter = None;
                }
                return true;
            }
            return false;
        }
        if self.holders.is_empty() {
            self.holders.push((owner, kind));
            return true;
        }
        let all_shared = self.holders.iter().all(|(_, k)| *k == LockKind::Shared);
        if kind == LockKind::Shared && all_shared && self.upgrade_waiter.is_none() {
            self.holders.push((owner, kind));
            return true;
        }
        false
    }

    fn holds(&self, owner: TxnId) -> bool {
        self.holders.iter().any(|(o, _)| *o == owner)
    }
}

struct LockShard {
    locks: HashMap<LockKey, LockEntry>,
}

/// Sharded lock table with blocking waits.
pub(crate) struct LockTable {
    shards: Vec<(Mutex<LockShard>, Condvar)>,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| {
                (
                    Mutex::new(LockShard {
                        locks: HashMap::new(),
                    }),
                    Condvar::new(),
                )
            })
            .collect();
        Self { shards }
    }

    fn shard(&self, key: &LockKey) -> &(Mutex<LockShard>, Condvar) {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % NUM_SHARDS]
    }

    /// Acquires `kind` on `(db, key)` for the requester, blocking until
    /// granted or until a timeout/no-wait/deadlock condition fails the
    /// request. Reentrant for locks the owner already holds.
    pub(crate) fn acquire(
        &self,
        req: &LockRequest,
        db: u64,
        key: &[u8],
        kind: LockKind,
    ) -> Result<(), TxnError> {
        let lock_key = LockKey {
            db,
            key: key.to_vec(),
        };
        let (mutex, condvar) = self.shard(&lock_key);
        let mut shard = mutex.lock();
        let start = Instant::now();

        loop {
            let entry = shard
                .locks
                .entry(lock_key.clone())
                .or_insert_with(LockEntry::new);

            if entry.try_grant(req.owner, kind) {
                return Ok(());
            }

            // Conflict. An upgrading holder must register as the waiter;
            // a second concurrent upgrader can never make progress.
            let upgrading = entry.holds(req.owner) && kind == LockKind::Exclusive;
            if upgrading {
                match entry.upgrade_waiter {
                    None => entry.upgrade_waiter = Some(req.owner),
                    Some(w) if w == req.owner => {}
                    Some(_) => return Err(TxnError::Deadlock),
                }
            }

            if req.no_wait {
                Self::clear_waiter(&mut shard, &lock_key, req.owner);
                return Err(TxnError::LockNotGranted);
            }

            let now = Instant::now();
            if let Some(deadline) = req.txn_deadline {
                if now >= deadline {
                    Self::clear_waiter(&mut shard, &lock_key, req.owner);
                    return Err(TxnError::TxnTimeout { id: req.owner });
                }
            }
            let lock_deadline = start + req.lock_timeout;
            if now >= lock_deadline {
                Self::clear_waiter(&mut shard, &lock_key, req.owner);
                return Err(TxnError::LockTimeout {
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }

            let wait_until = match req.txn_deadline {
                Some(d) => lock_deadline.min(d),
                None => lock_deadline,
            };
            condvar.wait_until(&mut shard, wait_until);
        }
    }

    /// Releases every lock held by `owner` and wakes all waiters.
    pub(crate) fn release_all(&self, owner: TxnId) {
        for (mutex, condvar) in &self.shards {
            let mut shard = mutex.lock();
            let mut changed = false;
            shard.locks.retain(|_, entry| {
                let before = entry.holders.len();
                entry.holders.retain(|(o, _)| *o != owner);
                if entry.upgrade_waiter == Some(owner) {
                    entry.upgrade_waiter = None;
                    changed = true;
                }
                if entry.holders.len() != before {
                    changed = true;
                }
                !entry.holders.is_empty() || entry.upgrade_waiter.is_some()
            });
            if changed {
                condvar.notify_all();
            }
        }
    }

    /// Releases a single shared hold, used by read-committed isolation to
    /// drop read locks as soon as the read completes. An exclusive hold on
    /// the same key is left in place.
    pub(crate) fn release_shared(&self, owner: TxnId, db: u64, key: &[u8]) {
        let lock_key = LockKey {
            db,
            key: key.to_vec(),
        };
        let (mutex, condvar) = self.shard(&lock_key);
        let mut shard = mutex.lock();
        if let Some(entry) = shard.locks.get_mut(&lock_key) {
            let before = entry.holders.len();
            entry
                .holders
                .retain(|(o, k)| !(*o == owner && *k == LockKind::Shared));
            if entry.holders.len() != before {
                if entry.holders.is_empty() && entry.upgrade_waiter.is_none() {
                    shard.locks.remove(&lock_key);
                }
                condvar.notify_all();
            }
        }
    }

    fn clear_waiter(shard: &mut LockShard, key: &LockKey, owner: TxnId) {
        if let Some(entry) = shard.locks.get_mut(key) {
            if entry.upgrade_waiter == Some(owner) {
                entry.upgrade_waiter = None;
            }
            if entry.holders.is_empty() && entry.upgrade_waiter.is_none() {
                shard.locks.remove(key);
            }
        }
    }
}
