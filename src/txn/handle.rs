// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Public transaction handle.
//!
//! A handle owns an exclusive reference to one internal transaction until
//! its terminal operation runs. Afterwards the reference is severed: the
//! id stays valid for logging and equality, every other use fails with
//! [`TxnError::Closed`]. Terminal operations take `&self` and win exactly
//! once, so a handle may be shared across workers.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::env::Environment;

use super::durability::Durability;
use super::error::TxnError;
use super::internal::Txn;
use super::TxnId;

enum CommitStyle {
    /// Resolve durability by precedence: config durability, config sync
    /// flags, environment default.
    Resolve,
    /// Explicit durability passed at the call-site.
    Explicit(Durability),
    /// Deprecated sync-flag style call-site (`commit_sync` and friends).
    Deprecated(Durability),
}

/// A transaction handle.
pub struct Transaction {
    env: Environment,
    id: TxnId,
    name: Mutex<Option<String>>,
    txn: Mutex<Option<Arc<Txn>>>,
}

impl Transaction {
    pub(crate) fn new(env: Environment, txn: Arc<Txn>) -> Self {
        // Copy the id out so it survives severing the internal reference.
        let id = txn.id();
        Self {
            env,
            id,
            name: Mutex::new(None),
            txn: Mutex::new(Some(txn)),
        }
    }

    /// The transaction's unique id. Valid for the life of the handle,
    /// including after commit or abort.
    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// The transaction's name, if one was assigned.
    pub fn name(&self) -> Option<String> {
        self.name.lock().clone()
    }

    /// Assigns a human-readable name, for diagnostics only.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock() = Some(name.into());
    }

    /// Commits under the durability resolved from the stored configuration
    /// and the environment default.
    pub fn commit(&self) -> Result<(), TxnError> {
        self.finish_commit(CommitStyle::Resolve)
    }

    /// Commits under an explicitly supplied durability. Fails with
    /// [`TxnError::MixedDurabilityApi`] if the stored configuration used
    /// the deprecated sync flags.
    pub fn commit_durable(&self, durability: Durability) -> Result<(), TxnError> {
        self.finish_commit(CommitStyle::Explicit(durability))
    }

    /// Commits, writing and synchronously flushing the log.
    pub fn commit_sync(&self) -> Result<(), TxnError> {
        self.finish_commit(CommitStyle::Deprecated(Durability::SYNC))
    }

    /// Commits without writing or flushing the log.
    pub fn commit_no_sync(&self) -> Result<(), TxnError> {
        self.finish_commit(CommitStyle::Deprecated(Durability::NO_SYNC))
    }

    /// Commits, writing but not flushing the log.
    pub fn commit_write_no_sync(&self) -> Result<(), TxnError> {
        self.finish_commit(CommitStyle::Deprecated(Durability::WRITE_NO_SYNC))
    }

    fn finish_commit(&self, style: CommitStyle) -> Result<(), TxnError> {
        self.env.check_valid()?;
        let txn = self.sever()?;
        let config = txn.config();
        let durability = match style {
            CommitStyle::Explicit(durability) => {
                if config.uses_sync_api() {
                    let _ = txn.abort();
                    return Err(TxnError::MixedDurabilityApi);
                }
                durability
            }
            CommitStyle::Deprecated(durability) => {
                if config.durability().is_some() {
                    let _ = txn.abort();
                    return Err(TxnError::MixedDurabilityApi);
                }
                durability
            }
            CommitStyle::Resolve => config.durability().unwrap_or_else(|| {
                if config.uses_sync_api() {
                    config.durability_from_sync()
                } else {
                    self.env.config().durability
                }
            }),
        };
        // Txn::commit aborts itself and its children on failure.
        txn.commit(durability)
    }

    /// Aborts the transaction: every modification is undone, every lock
    /// held by it and its children released.
    pub fn abort(&self) -> Result<(), TxnError> {
        self.env.check_valid()?;
        let txn = self.sever()?;
        txn.abort()
    }

    /// Bounds how long the transaction waits on any single lock. Checked
    /// at lock-wait points, so enforcement latency follows wait wakeups.
    pub fn set_lock_timeout(&self, timeout: Duration) -> Result<(), TxnError> {
        self.env.check_valid()?;
        self.internal()?.set_lock_timeout(timeout);
        Ok(())
    }

    /// Bounds how long the transaction may remain open. Checked at
    /// lock-wait points.
    pub fn set_txn_timeout(&self, timeout: Duration) -> Result<(), TxnError> {
        self.env.check_valid()?;
        self.internal()?.set_txn_timeout(timeout);
        Ok(())
    }

    /// The internal transaction, for lockers and the XA adapter.
    pub(crate) fn internal(&self) -> Result<Arc<Txn>, TxnError> {
        self.txn
            .lock()
            .clone()
            .ok_or(TxnError::Closed { id: self.id })
    }

    /// Severs the handle's reference to the internal transaction.
    fn sever(&self) -> Result<Arc<Txn>, TxnError> {
        self.txn
            .lock()
            .take()
            .ok_or(TxnError::Closed { id: self.id })
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}

impl std::hash::Hash for Transaction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Transaction id=\"{}\"", self.id)?;
        if let Some(name) = self.name.lock().as_deref() {
            write!(f, " name=\"{}\"", name)?;
        }
        write!(f, ">")
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("name", &*self.name.lock())
            .field("open", &self.txn.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvironmentConfig;
    use crate::store::DatabaseConfig;
    use crate::txn::TransactionConfig;

    fn test_env() -> Environment {
        Environment::new(EnvironmentConfig::default())
    }

    fn begin(env: &Environment) -> Transaction {
        env.begin_transaction(None, TransactionConfig::new()).unwrap()
    }

    #[test]
    fn test_commit_closes_handle() {
        let env = test_env();
        let txn = begin(&env);
        let id = txn.id();
        txn.commit().unwrap();

        assert_eq!(txn.id(), id);
        assert!(matches!(txn.commit(), Err(TxnError::Closed { .. })));
        assert!(matches!(txn.abort(), Err(TxnError::Closed { .. })));
        assert!(matches!(
            txn.set_lock_timeout(Duration::from_millis(1)),
            Err(TxnError::Closed { .. })
        ));
    }

    #[test]
    fn test_abort_closes_handle() {
        let env = test_env();
        let txn = begin(&env);
        txn.abort().unwrap();
        assert!(matches!(txn.abort(), Err(TxnError::Closed { .. })));
        assert!(matches!(txn.commit(), Err(TxnError::Closed { .. })));
    }

    #[test]
    fn test_commit_variants_resolve() {
        let env = test_env();
        begin(&env).commit_sync().unwrap();
        begin(&env).commit_no_sync().unwrap();
        begin(&env).commit_write_no_sync().unwrap();
        begin(&env).commit_durable(Durability::NO_SYNC).unwrap();

        let mut config = TransactionConfig::new();
        config.set_no_sync(true).unwrap();
        env.begin_transaction(None, config).unwrap().commit().unwrap();

        let mut config = TransactionConfig::new();
        config.set_durability(Some(Durability::WRITE_NO_SYNC)).unwrap();
        env.begin_transaction(None, config).unwrap().commit().unwrap();
    }

    #[test]
    fn test_explicit_durability_with_sync_config_fails_and_aborts() {
        let env = test_env();
        let db = env.open_database("db", DatabaseConfig::default()).unwrap();

        let mut config = TransactionConfig::new();
        config.set_sync(true).unwrap();
        let txn = env.begin_transaction(None, config).unwrap();
        db.put(Some(&txn), b"k", b"v").unwrap();

        let err = txn.commit_durable(Durability::NO_SYNC).unwrap_err();
        assert!(matches!(err, TxnError::MixedDurabilityApi));
        // The failed commit aborted the transaction and closed the handle.
        assert!(matches!(txn.commit(), Err(TxnError::Closed { .. })));
        assert_eq!(db.get(None, b"k").unwrap(), None);
    }

    #[test]
    fn test_sync_call_with_explicit_durability_config_fails() {
        let env = test_env();
        let mut config = TransactionConfig::new();
        config.set_durability(Some(Durability::SYNC)).unwrap();
        let txn = env.begin_transaction(None, config).unwrap();
        assert!(matches!(
            txn.commit_no_sync(),
            Err(TxnError::MixedDurabilityApi)
        ));
    }

    #[test]
    fn test_child_commit_folds_into_parent() {
        let env = test_env();
        let db = env.open_database("db", DatabaseConfig::default()).unwrap();

        let parent = begin(&env);
        let child = env
            .begin_transaction(Some(&parent), TransactionConfig::new())
            .unwrap();
        db.put(Some(&child), b"k", b"child").unwrap();
        child.commit().unwrap();

        // A committed child stays undoable through its parent.
        parent.abort().unwrap();
        assert_eq!(db.get(None, b"k").unwrap(), None);
    }

    #[test]
    fn test_parent_commit_keeps_child_writes() {
        let env = test_env();
        let db = env.open_database("db", DatabaseConfig::default()).unwrap();

        let parent = begin(&env);
        let child = env
            .begin_transaction(Some(&parent), TransactionConfig::new())
            .unwrap();
        db.put(Some(&child), b"k", b"child").unwrap();
        child.commit().unwrap();
        parent.commit().unwrap();
        assert_eq!(db.get(None, b"k").unwrap(), Some(b"child".to_vec()));
    }

    #[test]
    fn test_parent_abort_cascades_to_active_children() {
        let env = test_env();
        let db = env.open_database("db", DatabaseConfig::default()).unwrap();

        let parent = begin(&env);
        let child = env
            .begin_transaction(Some(&parent), TransactionConfig::new())
            .unwrap();
        db.put(Some(&child), b"k", b"child").unwrap();

        parent.abort().unwrap();
        assert_eq!(db.get(None, b"k").unwrap(), None);
        // The child was aborted by the cascade.
        assert!(matches!(child.commit(), Err(TxnError::Closed { .. })));
    }

    #[test]
    fn test_parent_commit_with_unresolved_child_fails() {
        let env = test_env();
        let db = env.open_database("db", DatabaseConfig::default()).unwrap();

        let parent = begin(&env);
        let child = env
            .begin_transaction(Some(&parent), TransactionConfig::new())
            .unwrap();
        db.put(Some(&child), b"k", b"child").unwrap();

        let err = parent.commit().unwrap_err();
        assert!(matches!(err, TxnError::UnresolvedChildren { .. }));
        assert_eq!(db.get(None, b"k").unwrap(), None);
    }

    #[test]
    fn test_lock_timeout_applies_at_wait() {
        let env = test_env();
        let db = env.open_database("db", DatabaseConfig::default()).unwrap();

        let writer = begin(&env);
        db.put(Some(&writer), b"k", b"v").unwrap();

        let reader = begin(&env);
        reader.set_lock_timeout(Duration::from_millis(10)).unwrap();
        let err = db.get(Some(&reader), b"k").unwrap_err();
        assert!(matches!(err, TxnError::LockTimeout { .. }));
        assert!(err.is_lock_conflict());

        reader.abort().unwrap();
        writer.commit().unwrap();
    }

    #[test]
    fn test_txn_timeout_applies_at_wait() {
        let env = test_env();
        let db = env.open_database("db", DatabaseConfig::default()).unwrap();

        let writer = begin(&env);
        db.put(Some(&writer), b"k", b"v").unwrap();

        let reader = begin(&env);
        reader.set_txn_timeout(Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let err = db.get(Some(&reader), b"k").unwrap_err();
        assert!(matches!(err, TxnError::TxnTimeout { .. }));

        reader.abort().unwrap();
        writer.abort().unwrap();
    }

    #[test]
    fn test_equality_and_display() {
        let env = test_env();
        let a = begin(&env);
        let b = begin(&env);
        assert_eq!(a, a);
        assert_ne!(a, b);

        a.set_name("loader");
        assert_eq!(a.name().as_deref(), Some("loader"));
        let shown = a.to_string();
        assert!(shown.contains("loader"));
        assert!(shown.contains(&a.id().to_string()));
        a.abort().unwrap();
        b.abort().unwrap();
    }

    #[test]
    fn test_commit_fails_on_invalid_environment() {
        let env = test_env();
        let txn = begin(&env);
        env.invalidate("poison");
        assert!(matches!(
            txn.commit(),
            Err(TxnError::EnvironmentInvalid { .. })
        ));
    }
}
