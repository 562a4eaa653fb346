// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Positioned cursor over a sorted key/duplicate-set space.
//!
//! Search modes are explicit tagged values rather than method-level
//! polymorphism, and every read copies into an owned buffer at the
//! boundary, so no caller-owned memory is ever aliased.

use std::ops::Bound;

use crate::txn::lock_table::LockKind;
use crate::txn::locker::Locker;
use crate::txn::TxnError;

use super::database::Database;

/// Outcome of a store operation that can miss without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    /// The operation found or stored the record.
    Success,
    /// The requested record does not exist.
    NotFound,
    /// An insert found the key already present.
    KeyExist,
}

/// Isolation requested for a single cursor read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Lock per the owning transaction's configuration.
    #[default]
    Default,
    /// Read without locking; may observe uncommitted data.
    ReadUncommitted,
    /// Read with an exclusive lock, for read-modify-write cycles.
    Rmw,
}

/// Explicit search modes understood by [`Cursor::search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchMode {
    /// Exact key; position at its first duplicate.
    Set,
    /// Exact key/data pair.
    Both,
}

struct Position {
    key: Vec<u8>,
    data: Vec<u8>,
}

/// A positioned cursor.
pub struct Cursor {
    db: Database,
    locker: Locker,
    position: Option<Position>,
    open: bool,
}

impl Cursor {
    pub(crate) fn new(db: Database, locker: Locker) -> Self {
        locker.txn().cursor_opened();
        Self {
            db,
            locker,
            position: None,
            open: true,
        }
    }

    pub(crate) fn locker(&self) -> &Locker {
        &self.locker
    }

    /// Duplicates this cursor: same locker, same position.
    pub fn dup(&self) -> Result<Cursor, TxnError> {
        self.check_open()?;
        let mut dup = Self::new(self.db.clone(), self.locker.clone());
        dup.position = self.position.as_ref().map(|p| Position {
            key: p.key.clone(),
            data: p.data.clone(),
        });
        Ok(dup)
    }

    /// Positions at `key` and returns a copy of its first data item.
    pub fn search_key(
        &mut self,
        key: &[u8],
        mode: LockMode,
    ) -> Result<Option<Vec<u8>>, TxnError> {
        match self.search(SearchMode::Set, key, None, mode)? {
            Some(data) => Ok(Some(data)),
            None => Ok(None),
        }
    }

    /// Positions at the exact `(key, data)` pair. Returns false, leaving
    /// the position unchanged, when the pair is absent.
    pub fn search_both(
        &mut self,
        key: &[u8],
        data: &[u8],
        mode: LockMode,
    ) -> Result<bool, TxnError> {
        Ok(self.search(SearchMode::Both, key, Some(data), mode)?.is_some())
    }

    pub(crate) fn search(
        &mut self,
        search_mode: SearchMode,
        key: &[u8],
        data: Option<&[u8]>,
        mode: LockMode,
    ) -> Result<Option<Vec<u8>>, TxnError> {
        self.check_open()?;
        let release = self.lock_for_read(key, mode)?;
        let found = {
            let tree = self.db.inner.tree.read();
            match (search_mode, data) {
                (SearchMode::Set, _) => tree
                    .get(key)
                    .and_then(|set| set.iter().next())
                    .cloned(),
                (SearchMode::Both, Some(data)) => tree
                    .get(key)
                    .filter(|set| set.contains(data))
                    .map(|_| data.to_vec()),
                (SearchMode::Both, None) => {
                    return Err(TxnError::InvalidArgument(
                        "search mode BOTH requires a data item",
                    ))
                }
            }
        };
        self.finish_read(key, release);
        if let Some(data) = &found {
            self.position = Some(Position {
                key: key.to_vec(),
                data: data.clone(),
            });
        }
        Ok(found)
    }

    /// Returns a copy of the record at the current position, or `None` if
    /// the record was deleted from under the cursor.
    pub fn current(&self, mode: LockMode) -> Result<Option<(Vec<u8>, Vec<u8>)>, TxnError> {
        self.check_open()?;
        let (key, data) = match &self.position {
            Some(p) => (p.key.clone(), p.data.clone()),
            None => return Err(TxnError::InvalidArgument("cursor is not positioned")),
        };
        let release = self.lock_for_read(&key, mode)?;
        let exists = {
            let tree = self.db.inner.tree.read();
            tree.get(&key).is_some_and(|set| set.contains(&data))
        };
        self.finish_read(&key, release);
        Ok(exists.then_some((key, data)))
    }

    /// Advances to the next duplicate of the current key, never resetting
    /// to the start of the duplicate set.
    pub fn next_dup(&mut self, mode: LockMode) -> Result<Option<(Vec<u8>, Vec<u8>)>, TxnError> {
        self.check_open()?;
        let (key, data) = match &self.position {
            Some(p) => (p.key.clone(), p.data.clone()),
            None => return Err(TxnError::InvalidArgument("cursor is not positioned")),
        };
        let release = self.lock_for_read(&key, mode)?;
        let next = {
            let tree = self.db.inner.tree.read();
            tree.get(&key).and_then(|set| {
                set.range::<Vec<u8>, _>((Bound::Excluded(&data), Bound::Unbounded))
                    .next()
                    .cloned()
            })
        };
        self.finish_read(&key, release);
        match next {
            Some(next_data) => {
                self.position = Some(Position {
                    key: key.clone(),
                    data: next_data.clone(),
                });
                Ok(Some((key, next_data)))
            }
            None => Ok(None),
        }
    }

    /// Number of duplicates stored under the current key.
    pub fn count(&self, mode: LockMode) -> Result<usize, TxnError> {
        self.check_open()?;
        let key = match &self.position {
            Some(p) => p.key.clone(),
            None => return Err(TxnError::InvalidArgument("cursor is not positioned")),
        };
        let release = self.lock_for_read(&key, mode)?;
        let count = {
            let tree = self.db.inner.tree.read();
            tree.get(&key).map_or(0, |set| set.len())
        };
        self.finish_read(&key, release);
        Ok(count)
    }

    /// Stores a record: overwrite for unique keys, duplicate insert for
    /// duplicate databases. Positions the cursor on the stored pair.
    pub fn put(&mut self, key: &[u8], data: &[u8]) -> Result<(), TxnError> {
        self.check_open()?;
        let txn = self.locker.txn().clone();
        txn.lock_key(self.db.id(), key, LockKind::Exclusive)?;
        {
            let mut tree = self.db.inner.tree.write();
            let set = tree.entry(key.to_vec()).or_default();
            if self.db.config().sorted_duplicates() {
                if set.insert(data.to_vec()) {
                    txn.push_undo(crate::txn::internal::UndoRecord::DupInsert {
                        db: self.db.clone(),
                        key: key.to_vec(),
                        data: data.to_vec(),
                    });
                }
            } else {
                let prev = set.iter().next().cloned();
                set.clear();
                set.insert(data.to_vec());
                txn.push_undo(crate::txn::internal::UndoRecord::Put {
                    db: self.db.clone(),
                    key: key.to_vec(),
                    prev,
                });
            }
        }
        self.position = Some(Position {
            key: key.to_vec(),
            data: data.to_vec(),
        });
        Ok(())
    }

    /// Stores a record only if the key is absent from the database.
    pub fn put_no_overwrite(&mut self, key: &[u8], data: &[u8]) -> Result<OpStatus, TxnError> {
        self.check_open()?;
        let txn = self.locker.txn().clone();
        txn.lock_key(self.db.id(), key, LockKind::Exclusive)?;
        {
            let mut tree = self.db.inner.tree.write();
            if tree.get(key).is_some_and(|set| !set.is_empty()) {
                return Ok(OpStatus::KeyExist);
            }
            tree.entry(key.to_vec()).or_default().insert(data.to_vec());
            txn.push_undo(crate::txn::internal::UndoRecord::Put {
                db: self.db.clone(),
                key: key.to_vec(),
                prev: None,
            });
        }
        self.position = Some(Position {
            key: key.to_vec(),
            data: data.to_vec(),
        });
        Ok(OpStatus::Success)
    }

    /// Closes the cursor. Fails if it was already closed.
    pub fn close(&mut self) -> Result<(), TxnError> {
        if !self.open {
            return Err(TxnError::InvalidArgument("cursor is already closed"));
        }
        self.open = false;
        self.locker.txn().cursor_closed();
        Ok(())
    }

    fn check_open(&self) -> Result<(), TxnError> {
        if self.open {
            Ok(())
        } else {
            Err(TxnError::InvalidArgument("cursor is already closed"))
        }
    }

    /// Acquires the read lock `mode` implies. Returns true when a shared
    /// lock was taken that read-committed isolation should release right
    /// after the read.
    fn lock_for_read(&self, key: &[u8], mode: LockMode) -> Result<bool, TxnError> {
        let txn = self.locker.txn();
        match mode {
            LockMode::ReadUncommitted => Ok(false),
            LockMode::Rmw => {
                txn.lock_key(self.db.id(), key, LockKind::Exclusive)?;
                Ok(false)
            }
            LockMode::Default => {
                if txn.config().read_uncommitted() {
                    return Ok(false);
                }
                txn.lock_key(self.db.id(), key, LockKind::Shared)?;
                Ok(txn.config().read_committed())
            }
        }
    }

    fn finish_read(&self, key: &[u8], release: bool) {
        if release {
            self.locker.txn().release_read_lock(self.db.id(), key);
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            self.locker.txn().cursor_closed();
        }
    }
}
