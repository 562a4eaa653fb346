// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Environment handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::store::{Database, DatabaseConfig};
use crate::txn::manager::TxnManager;
use crate::txn::{Transaction, TransactionConfig, TxnError};

use super::config::EnvironmentConfig;

pub(crate) struct EnvInner {
    config: EnvironmentConfig,
    txn_manager: TxnManager,
    databases: Mutex<HashMap<String, Database>>,
    next_db_id: AtomicU64,
    invalid: Mutex<Option<String>>,
}

/// An environment: the root object owning databases, the transaction
/// manager, and the shared defaults.
///
/// Cloning is cheap; all clones share one underlying environment. Once
/// invalidated, every handle derived from the environment fails the same
/// way, preventing partial continued operation.
#[derive(Clone)]
pub struct Environment {
    pub(crate) inner: Arc<EnvInner>,
}

impl Environment {
    /// Creates an environment with the given defaults.
    pub fn new(config: EnvironmentConfig) -> Self {
        info!(?config.durability, "environment opened");
        Self {
            inner: Arc::new(EnvInner {
                config,
                txn_manager: TxnManager::new(),
                databases: Mutex::new(HashMap::new()),
                next_db_id: AtomicU64::new(1),
                invalid: Mutex::new(None),
            }),
        }
    }

    /// The environment defaults.
    #[inline]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.inner.config
    }

    /// Begins a transaction, optionally nested under `parent`.
    pub fn begin_transaction(
        &self,
        parent: Option<&Transaction>,
        config: TransactionConfig,
    ) -> Result<Transaction, TxnError> {
        self.check_valid()?;
        let parent_txn = parent.map(|p| p.internal()).transpose()?;
        let txn = self.inner.txn_manager.begin(
            config,
            parent_txn.as_ref(),
            self.inner.config.lock_timeout,
            self.inner.config.txn_timeout,
        );
        Ok(Transaction::new(self.clone(), txn))
    }

    /// Opens (or creates) a named database. Reopening an existing name
    /// returns the same database.
    pub fn open_database(
        &self,
        name: &str,
        config: DatabaseConfig,
    ) -> Result<Database, TxnError> {
        self.check_valid()?;
        let mut databases = self.inner.databases.lock();
        if let Some(db) = databases.get(name) {
            return Ok(db.clone());
        }
        let id = self.inner.next_db_id.fetch_add(1, Ordering::Relaxed);
        let db = Database::new(id, name.to_string(), config, Arc::downgrade(&self.inner));
        databases.insert(name.to_string(), db.clone());
        Ok(db)
    }

    /// Marks the whole environment unusable. Every subsequent operation on
    /// any handle fails with [`TxnError::EnvironmentInvalid`].
    pub fn invalidate(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "environment invalidated");
        let mut invalid = self.inner.invalid.lock();
        if invalid.is_none() {
            *invalid = Some(reason);
        }
    }

    /// True until [`invalidate`](Self::invalidate) is called.
    pub fn is_valid(&self) -> bool {
        self.inner.invalid.lock().is_none()
    }

    /// True if `other` refers to this same underlying environment.
    pub fn is_same(&self, other: &Environment) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn check_valid(&self) -> Result<(), TxnError> {
        match self.inner.invalid.lock().as_ref() {
            None => Ok(()),
            Some(reason) => Err(TxnError::EnvironmentInvalid {
                reason: reason.clone(),
            }),
        }
    }

    pub(crate) fn txn_manager(&self) -> &TxnManager {
        &self.inner.txn_manager
    }

    pub(crate) fn from_inner(inner: Arc<EnvInner>) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_fails_after_invalidate() {
        let env = Environment::new(EnvironmentConfig::default());
        env.invalidate("test poison");
        let err = env
            .begin_transaction(None, TransactionConfig::new())
            .unwrap_err();
        assert!(matches!(err, TxnError::EnvironmentInvalid { .. }));
    }

    #[test]
    fn test_reopen_returns_same_database() {
        let env = Environment::new(EnvironmentConfig::default());
        let a = env.open_database("db", DatabaseConfig::default()).unwrap();
        let b = env.open_database("db", DatabaseConfig::default()).unwrap();
        assert_eq!(a.name(), b.name());
        a.put(None, b"k", b"v").unwrap();
        assert_eq!(b.get(None, b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_is_same() {
        let env = Environment::new(EnvironmentConfig::default());
        let clone = env.clone();
        let other = Environment::new(EnvironmentConfig::default());
        assert!(env.is_same(&clone));
        assert!(!env.is_same(&other));
    }
}
