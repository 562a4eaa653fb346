// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Sorted key/duplicate-set database.
//!
//! Stands in for the B-tree collaborator: a sorted map of keys to sorted
//! duplicate sets under a reader-writer lock. Record-level isolation comes
//! from the lock table, not from this structure; every mutation happens
//! under locks obtained through a [`Locker`](crate::txn::locker::Locker).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::env::{EnvInner, Environment};
use crate::txn::locker::Locker;
use crate::txn::{Transaction, TxnError};

use super::cursor::{Cursor, LockMode, OpStatus};

/// Configuration for a database.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    sorted_duplicates: bool,
}

impl DatabaseConfig {
    /// Creates a configuration with the system defaults: unique keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits multiple data items per key, kept in sorted order.
    pub fn with_sorted_duplicates(mut self, sorted_duplicates: bool) -> Self {
        self.sorted_duplicates = sorted_duplicates;
        self
    }

    /// True if the database keeps sorted duplicate sets.
    #[inline]
    pub fn sorted_duplicates(&self) -> bool {
        self.sorted_duplicates
    }
}

pub(crate) struct DbInner {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) config: DatabaseConfig,
    pub(crate) env: Weak<EnvInner>,
    pub(crate) tree: RwLock<BTreeMap<Vec<u8>, BTreeSet<Vec<u8>>>>,
}

/// A handle to a sorted key/duplicate-set database. Cloning is cheap and
/// shares the underlying store.
#[derive(Clone)]
pub struct Database {
    pub(crate) inner: Arc<DbInner>,
}

impl Database {
    pub(crate) fn new(
        id: u64,
        name: String,
        config: DatabaseConfig,
        env: Weak<EnvInner>,
    ) -> Self {
        Self {
            inner: Arc::new(DbInner {
                id,
                name,
                config,
                env,
                tree: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// The database name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration the database was opened with.
    #[inline]
    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    pub(crate) fn environment(&self) -> Result<Environment, TxnError> {
        self.inner
            .env
            .upgrade()
            .map(Environment::from_inner)
            .ok_or(TxnError::EnvironmentInvalid {
                reason: "environment has been closed".to_string(),
            })
    }

    /// Opens a cursor. With `txn`, operations run under that transaction;
    /// without, the cursor runs an auto-commit transaction that resolves
    /// when the cursor closes.
    pub fn open_cursor(&self, txn: Option<&Transaction>) -> Result<Cursor, TxnError> {
        let env = self.environment()?;
        env.check_valid()?;
        let locker = Locker::writable(&env, txn, None)?;
        Ok(Cursor::new(self.clone(), locker))
    }

    /// Stores a record, overwriting a unique key or adding a duplicate.
    pub fn put(&self, txn: Option<&Transaction>, key: &[u8], data: &[u8]) -> Result<(), TxnError> {
        self.with_write_cursor(txn, |cursor| cursor.put(key, data))
    }

    /// Stores a record only if the key is absent.
    pub fn put_no_overwrite(
        &self,
        txn: Option<&Transaction>,
        key: &[u8],
        data: &[u8],
    ) -> Result<OpStatus, TxnError> {
        self.with_write_cursor(txn, |cursor| cursor.put_no_overwrite(key, data))
    }

    /// Reads the (first) data item stored under `key`.
    pub fn get(&self, txn: Option<&Transaction>, key: &[u8]) -> Result<Option<Vec<u8>>, TxnError> {
        self.with_write_cursor(txn, |cursor| cursor.search_key(key, LockMode::Default))
    }

    /// Runs one cursor operation under a writable locker, auto-committing
    /// when no transaction was supplied.
    fn with_write_cursor<T>(
        &self,
        txn: Option<&Transaction>,
        op: impl FnOnce(&mut Cursor) -> Result<T, TxnError>,
    ) -> Result<T, TxnError> {
        let env = self.environment()?;
        env.check_valid()?;
        let locker = Locker::writable(&env, txn, None)?;
        let mut cursor = Cursor::new(self.clone(), locker.clone());
        let result = op(&mut cursor);
        let _ = cursor.close();
        let end = locker.operation_end(result.is_ok());
        let value = result?;
        end?;
        Ok(value)
    }

    /// Restores the pre-image of a unique-key put.
    pub(crate) fn revert_put(&self, key: &[u8], prev: Option<Vec<u8>>) {
        let mut tree = self.inner.tree.write();
        match prev {
            Some(data) => {
                let set = tree.entry(key.to_vec()).or_default();
                set.clear();
                set.insert(data);
            }
            None => {
                tree.remove(key);
            }
        }
    }

    /// Removes one duplicate inserted under the key.
    pub(crate) fn remove_duplicate(&self, key: &[u8], data: &[u8]) {
        let mut tree = self.inner.tree.write();
        if let Some(set) = tree.get_mut(key) {
            set.remove(data);
            if set.is_empty() {
                tree.remove(key);
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .field("sorted_duplicates", &self.inner.config.sorted_duplicates)
            .finish()
    }
}
