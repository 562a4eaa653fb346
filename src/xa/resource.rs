// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! XA resource-manager adapter.
//!
//! Maps external global transaction ids onto internal transactions and
//! drives them through start/end/prepare/commit/rollback/recover. The
//! binding table and the per-worker association live in the environment's
//! transaction manager, so their lifecycle ends with the environment.
//!
//! Flag sets are modeled as enums, which makes the invalid bit
//! combinations of the classic integer-flag surface unrepresentable;
//! the remaining protocol-order failures keep their standard codes.

use std::time::Duration;

use tracing::{debug, instrument};

use crate::env::Environment;
use crate::txn::{Transaction, TransactionConfig};

use super::error::XaError;
use super::xid::Xid;

/// Association flags for [`XaEnvironment::start`]. Exactly one applies
/// per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XaStart {
    /// Create a new branch; the xid must not be bound yet.
    NoFlags,
    /// Join an existing, unprepared branch with no active worker.
    Join,
    /// Resume a suspended branch.
    Resume,
}

/// Disassociation flags for [`XaEnvironment::end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XaEnd {
    /// The branch completed its work normally.
    Success,
    /// The branch failed; mark it abort-only.
    Fail,
    /// Suspend the branch for a later resume.
    Suspend,
}

/// Scan control for [`XaEnvironment::recover`]. This adapter keeps no
/// scan-cursor state and returns the full set on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XaRecoverScan {
    NoFlags,
    StartScan,
    EndScan,
}

/// Outcome of [`XaEnvironment::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XaPrepare {
    /// The branch is prepared and awaits phase two.
    Ok,
    /// The branch made no durable changes; the adapter already committed
    /// it and the coordinator need not call commit.
    ReadOnly,
}

/// An environment exposed as an XA resource manager.
pub struct XaEnvironment {
    env: Environment,
}

impl XaEnvironment {
    /// Wraps an environment as a resource manager.
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    /// The underlying environment.
    #[inline]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Returns a transaction handle for the branch bound to `xid`, if one
    /// exists.
    pub fn transaction(&self, xid: &Xid) -> Result<Option<Transaction>, XaError> {
        self.env.check_valid()?;
        Ok(self
            .env
            .txn_manager()
            .xa_txn(xid)
            .map(|txn| Transaction::new(self.env.clone(), txn)))
    }

    /// Associates the calling worker with the branch identified by `xid`.
    #[instrument(level = "debug", name = "xa_start", skip(self), fields(%xid))]
    pub fn start(&self, xid: &Xid, flags: XaStart) -> Result<(), XaError> {
        self.env.check_valid()?;
        let mgr = self.env.txn_manager();

        match flags {
            XaStart::NoFlags => {
                if mgr.xa_txn(xid).is_some() {
                    return Err(XaError::DuplicateId { xid: xid.clone() });
                }
                if mgr.thread_txn().is_some() {
                    return Err(XaError::Protocol {
                        reason: "worker is already associated with a transaction",
                    });
                }
                let txn = mgr.begin(
                    TransactionConfig::new(),
                    None,
                    self.env.config().lock_timeout,
                    self.env.config().txn_timeout,
                );
                if !mgr.register_xa(xid.clone(), txn.clone()) {
                    let _ = txn.abort();
                    return Err(XaError::DuplicateId { xid: xid.clone() });
                }
                mgr.set_thread_txn(txn);
            }
            XaStart::Join => {
                let txn = mgr.xa_txn(xid).ok_or_else(|| XaError::NoTransaction {
                    xid: xid.clone(),
                })?;
                if mgr.thread_txn().is_some() {
                    return Err(XaError::Protocol {
                        reason: "worker is already associated with a transaction",
                    });
                }
                if txn.prepared() {
                    return Err(XaError::Protocol {
                        reason: "cannot join a prepared transaction",
                    });
                }
                mgr.set_thread_txn(txn);
            }
            XaStart::Resume => {
                let txn = mgr.xa_txn(xid).ok_or_else(|| XaError::NoTransaction {
                    xid: xid.clone(),
                })?;
                if mgr.thread_txn().is_some() {
                    return Err(XaError::Protocol {
                        reason: "worker is already associated with a transaction",
                    });
                }
                if !txn.suspended() {
                    return Err(XaError::Protocol {
                        reason: "resume requires a suspended transaction",
                    });
                }
                txn.set_suspended(false);
                mgr.set_thread_txn(txn);
            }
        }
        Ok(())
    }

    /// Clears the calling worker's association with the branch. `Fail`
    /// marks the branch abort-only; `Suspend` parks it for a later resume.
    pub fn end(&self, xid: &Xid, flags: XaEnd) -> Result<(), XaError> {
        self.env.check_valid()?;
        let mgr = self.env.txn_manager();
        debug!(%xid, ?flags, "xa end");

        let txn = match mgr.unset_thread_txn() {
            Some(txn) => txn,
            None => {
                // No association on this worker: fall back to the binding,
                // which must already be suspended.
                let txn = mgr.xa_txn(xid).ok_or_else(|| XaError::NoTransaction {
                    xid: xid.clone(),
                })?;
                if !txn.suspended() {
                    return Err(XaError::NoTransaction { xid: xid.clone() });
                }
                txn
            }
        };

        match flags {
            XaEnd::Success => {}
            XaEnd::Fail => txn.set_only_abortable(),
            XaEnd::Suspend => txn.set_suspended(true),
        }
        Ok(())
    }

    /// First phase of two-phase commit. A branch with no durable changes
    /// reports [`XaPrepare::ReadOnly`] and is committed on the caller's
    /// behalf.
    pub fn prepare(&self, xid: &Xid) -> Result<XaPrepare, XaError> {
        self.env.check_valid()?;
        let txn = self
            .env
            .txn_manager()
            .xa_txn(xid)
            .ok_or_else(|| XaError::NoTransaction { xid: xid.clone() })?;

        let read_only = txn.prepare()?;
        debug!(%xid, read_only, "xa prepare");
        if read_only {
            self.commit(xid, true)?;
            return Ok(XaPrepare::ReadOnly);
        }
        Ok(XaPrepare::Ok)
    }

    /// Second phase of commit. `one_phase` is accepted for protocol
    /// completeness; both paths commit identically here.
    pub fn commit(&self, xid: &Xid, one_phase: bool) -> Result<(), XaError> {
        self.env.check_valid()?;
        let mgr = self.env.txn_manager();
        let txn = mgr.xa_txn(xid).ok_or_else(|| XaError::NoTransaction {
            xid: xid.clone(),
        })?;
        if txn.only_abortable() {
            return Err(XaError::RollbackRequired { xid: xid.clone() });
        }

        let config = txn.config();
        let durability = config.durability().unwrap_or_else(|| {
            if config.uses_sync_api() {
                config.durability_from_sync()
            } else {
                self.env.config().durability
            }
        });
        let result = txn.commit(durability);
        // Commit resolves the transaction either way; the binding is dead.
        mgr.unregister_xa(xid);
        result?;
        debug!(%xid, one_phase, "xa commit");
        Ok(())
    }

    /// Rolls the branch back and removes its binding.
    pub fn rollback(&self, xid: &Xid) -> Result<(), XaError> {
        self.env.check_valid()?;
        let mgr = self.env.txn_manager();
        let txn = mgr.xa_txn(xid).ok_or_else(|| XaError::NoTransaction {
            xid: xid.clone(),
        })?;
        let result = txn.abort();
        mgr.unregister_xa(xid);
        result?;
        debug!(%xid, "xa rollback");
        Ok(())
    }

    /// All branches eligible for recovery: prepared but unresolved. The
    /// scan flags are accepted but ignored; the full set is returned on
    /// every call, so coordinators that require exact scan-cursor
    /// semantics must not rely on incremental scans.
    pub fn recover(&self, _scan: XaRecoverScan) -> Result<Vec<Xid>, XaError> {
        self.env.check_valid()?;
        Ok(self.env.txn_manager().xa_recover())
    }

    /// Heuristically-completed branches are not supported; always fails.
    pub fn forget(&self, xid: &Xid) -> Result<(), XaError> {
        Err(XaError::NoTransaction { xid: xid.clone() })
    }

    /// True if `other` is backed by this same environment instance.
    pub fn is_same_rm(&self, other: &XaEnvironment) -> Result<bool, XaError> {
        self.env.check_valid()?;
        Ok(self.env.is_same(&other.env))
    }

    /// The environment's transaction timeout. Zero means unbounded.
    pub fn transaction_timeout(&self) -> Result<Duration, XaError> {
        self.env.check_valid()?;
        Ok(self.env.config().txn_timeout.unwrap_or(Duration::ZERO))
    }

    /// Changing the timeout through the XA surface is not supported;
    /// always reports false.
    pub fn set_transaction_timeout(&self, _timeout: Duration) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvironmentConfig;
    use crate::store::DatabaseConfig;
    use crate::xa::XaCode;

    fn xa_env() -> XaEnvironment {
        XaEnvironment::new(Environment::new(EnvironmentConfig::default()))
    }

    fn xid(n: u8) -> Xid {
        Xid::new(1, vec![n], vec![])
    }

    #[test]
    fn test_duplicate_start_fails() {
        let xa = xa_env();
        let xid = xid(1);
        xa.start(&xid, XaStart::NoFlags).unwrap();
        let err = xa.start(&xid, XaStart::NoFlags).unwrap_err();
        assert_eq!(err.code(), XaCode::DupId);
    }

    #[test]
    fn test_start_while_associated_fails() {
        let xa = xa_env();
        xa.start(&xid(1), XaStart::NoFlags).unwrap();
        // The worker must end its current branch before starting another.
        let err = xa.start(&xid(2), XaStart::NoFlags).unwrap_err();
        assert_eq!(err.code(), XaCode::Proto);
    }

    #[test]
    fn test_full_lifecycle() {
        let xa = xa_env();
        let db = xa
            .environment()
            .open_database("db", DatabaseConfig::default())
            .unwrap();
        let xid = xid(1);

        xa.start(&xid, XaStart::NoFlags).unwrap();
        let txn = xa.transaction(&xid).unwrap().unwrap();
        db.put(Some(&txn), b"k", b"v").unwrap();
        xa.end(&xid, XaEnd::Success).unwrap();

        assert_eq!(xa.prepare(&xid).unwrap(), XaPrepare::Ok);
        xa.commit(&xid, false).unwrap();
        assert_eq!(db.get(None, b"k").unwrap(), Some(b"v".to_vec()));

        // The binding is gone.
        let err = xa.commit(&xid, false).unwrap_err();
        assert_eq!(err.code(), XaCode::NoTxn);
    }

    #[test]
    fn test_prepare_read_only_commits_immediately() {
        let xa = xa_env();
        let xid = xid(1);
        xa.start(&xid, XaStart::NoFlags).unwrap();
        xa.end(&xid, XaEnd::Success).unwrap();

        assert_eq!(xa.prepare(&xid).unwrap(), XaPrepare::ReadOnly);
        // The adapter committed on our behalf; the binding is gone.
        let err = xa.commit(&xid, false).unwrap_err();
        assert_eq!(err.code(), XaCode::NoTxn);
    }

    #[test]
    fn test_fail_marks_abort_only() {
        let xa = xa_env();
        let db = xa
            .environment()
            .open_database("db", DatabaseConfig::default())
            .unwrap();
        let xid = xid(1);

        xa.start(&xid, XaStart::NoFlags).unwrap();
        let txn = xa.transaction(&xid).unwrap().unwrap();
        db.put(Some(&txn), b"k", b"v").unwrap();
        xa.end(&xid, XaEnd::Fail).unwrap();

        let err = xa.commit(&xid, false).unwrap_err();
        assert_eq!(err.code(), XaCode::RbRollback);

        xa.rollback(&xid).unwrap();
        assert_eq!(db.get(None, b"k").unwrap(), None);
    }

    #[test]
    fn test_suspend_and_resume() {
        let xa = xa_env();
        let xid = xid(1);
        xa.start(&xid, XaStart::NoFlags).unwrap();
        xa.end(&xid, XaEnd::Suspend).unwrap();

        // Ending again without an association requires the suspended state.
        xa.end(&xid, XaEnd::Success).unwrap();

        xa.start(&xid, XaStart::Resume).unwrap();
        xa.end(&xid, XaEnd::Success).unwrap();
        xa.rollback(&xid).unwrap();
    }

    #[test]
    fn test_resume_without_suspend_fails() {
        let xa = xa_env();
        let xid = xid(1);
        xa.start(&xid, XaStart::NoFlags).unwrap();
        xa.end(&xid, XaEnd::Success).unwrap();
        let err = xa.start(&xid, XaStart::Resume).unwrap_err();
        assert_eq!(err.code(), XaCode::Proto);
    }

    #[test]
    fn test_join_rules() {
        let xa = xa_env();
        let a = xid(1);
        xa.start(&a, XaStart::NoFlags).unwrap();

        // The worker is still associated: join is a protocol error.
        let err = xa.start(&a, XaStart::Join).unwrap_err();
        assert_eq!(err.code(), XaCode::Proto);

        xa.end(&a, XaEnd::Success).unwrap();
        xa.start(&a, XaStart::Join).unwrap();
        xa.end(&a, XaEnd::Success).unwrap();
        xa.rollback(&a).unwrap();

        // Joining a missing binding reports no-transaction.
        let err = xa.start(&xid(2), XaStart::Join).unwrap_err();
        assert_eq!(err.code(), XaCode::NoTxn);
    }

    #[test]
    fn test_join_prepared_fails() {
        let xa = xa_env();
        let db = xa
            .environment()
            .open_database("db", DatabaseConfig::default())
            .unwrap();
        let xid = xid(1);
        xa.start(&xid, XaStart::NoFlags).unwrap();
        let txn = xa.transaction(&xid).unwrap().unwrap();
        db.put(Some(&txn), b"k", b"v").unwrap();
        xa.end(&xid, XaEnd::Success).unwrap();
        xa.prepare(&xid).unwrap();

        let err = xa.start(&xid, XaStart::Join).unwrap_err();
        assert_eq!(err.code(), XaCode::Proto);
        xa.rollback(&xid).unwrap();
    }

    #[test]
    fn test_end_without_binding_fails() {
        let xa = xa_env();
        let err = xa.end(&xid(9), XaEnd::Success).unwrap_err();
        assert_eq!(err.code(), XaCode::NoTxn);
    }

    #[test]
    fn test_recover_lists_prepared_only() {
        let xa = xa_env();
        let db = xa
            .environment()
            .open_database("db", DatabaseConfig::default())
            .unwrap();

        let prepared = xid(1);
        xa.start(&prepared, XaStart::NoFlags).unwrap();
        let txn = xa.transaction(&prepared).unwrap().unwrap();
        db.put(Some(&txn), b"k1", b"v").unwrap();
        xa.end(&prepared, XaEnd::Success).unwrap();
        xa.prepare(&prepared).unwrap();

        let active = xid(2);
        xa.start(&active, XaStart::NoFlags).unwrap();
        xa.end(&active, XaEnd::Success).unwrap();

        // Scan flags are ignored; every call returns the full set.
        for scan in [
            XaRecoverScan::StartScan,
            XaRecoverScan::NoFlags,
            XaRecoverScan::EndScan,
        ] {
            assert_eq!(xa.recover(scan).unwrap(), vec![prepared.clone()]);
        }

        xa.commit(&prepared, false).unwrap();
        assert!(xa.recover(XaRecoverScan::NoFlags).unwrap().is_empty());
        xa.rollback(&active).unwrap();
    }

    #[test]
    fn test_forget_unsupported() {
        let xa = xa_env();
        let err = xa.forget(&xid(1)).unwrap_err();
        assert_eq!(err.code(), XaCode::NoTxn);
    }

    #[test]
    fn test_is_same_rm() {
        let env = Environment::new(EnvironmentConfig::default());
        let a = XaEnvironment::new(env.clone());
        let b = XaEnvironment::new(env);
        let c = xa_env();
        assert!(a.is_same_rm(&b).unwrap());
        assert!(!a.is_same_rm(&c).unwrap());
    }

    #[test]
    fn test_set_transaction_timeout_unsupported() {
        let xa = xa_env();
        assert!(!xa.set_transaction_timeout(Duration::from_secs(1)));
        assert_eq!(xa.transaction_timeout().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_environment_wraps_error() {
        let xa = xa_env();
        xa.environment().invalidate("poison");
        let err = xa.start(&xid(1), XaStart::NoFlags).unwrap_err();
        assert_eq!(err.code(), XaCode::RmErr);
    }
}
