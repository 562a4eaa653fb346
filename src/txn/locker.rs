// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lock ownership contexts.
//!
//! A [`Locker`] is the context a cursor acquires locks under: either a
//! caller-owned transaction, or an auto-commit transaction the locker
//! starts itself and resolves at `operation_end`. Auto-commit lockers are
//! how single operations (a sequence refill, a standalone put) get
//! transactional semantics without a caller-managed transaction.

use std::sync::Arc;

use crate::env::Environment;

use super::config::TransactionConfig;
use super::durability::Durability;
use super::error::TxnError;
use super::handle::Transaction;
use super::internal::Txn;

#[derive(Clone, Copy, PartialEq, Eq)]
enum LockerKind {
    /// Borrowed from a caller-owned transaction; resolution belongs to the
    /// owning handle.
    UserTxn,
    /// Owned by this locker; `operation_end` commits or aborts it.
    AutoCommit,
}

/// A transaction's (or auto-commit operation's) lock ownership context.
#[derive(Clone)]
pub(crate) struct Locker {
    txn: Arc<Txn>,
    kind: LockerKind,
    durability: Durability,
}

impl Locker {
    /// Locker borrowing a caller-owned transaction.
    pub(crate) fn for_txn(txn: Arc<Txn>) -> Self {
        Self {
            txn,
            kind: LockerKind::UserTxn,
            durability: Durability::SYNC,
        }
    }

    /// Writable locker for an operation: borrows `txn` when given,
    /// otherwise begins an auto-commit transaction configured by
    /// `auto_config` (falling back to the environment defaults).
    pub(crate) fn writable(
        env: &Environment,
        txn: Option<&Transaction>,
        auto_config: Option<&TransactionConfig>,
    ) -> Result<Self, TxnError> {
        if let Some(handle) = txn {
            return Ok(Self::for_txn(handle.internal()?));
        }
        env.check_valid()?;
        let config = auto_config.cloned().unwrap_or_default();
        let durability = config.durability().unwrap_or_else(|| {
            if config.uses_sync_api() {
                config.durability_from_sync()
            } else {
                env.config().durability
            }
        });
        let txn = env.txn_manager().begin(
            config,
            None,
            env.config().lock_timeout,
            env.config().txn_timeout,
        );
        Ok(Self {
            txn,
            kind: LockerKind::AutoCommit,
            durability,
        })
    }

    /// Read-only locker: borrows `txn` when given, otherwise an
    /// auto-commit context with the given isolation knobs.
    pub(crate) fn readable(
        env: &Environment,
        txn: Option<&Transaction>,
        read_uncommitted: bool,
    ) -> Result<Self, TxnError> {
        let mut config = TransactionConfig::new();
        config.set_read_uncommitted(read_uncommitted);
        Self::writable(env, txn, if txn.is_some() { None } else { Some(&config) })
    }

    #[inline]
    pub(crate) fn txn(&self) -> &Arc<Txn> {
        &self.txn
    }

    /// Reports the end of the operation this locker was created for.
    /// Auto-commit lockers resolve their transaction here; borrowed
    /// lockers are a no-op.
    pub(crate) fn operation_end(&self, success: bool) -> Result<(), TxnError> {
        if self.kind != LockerKind::AutoCommit || !self.txn.is_active() {
            return Ok(());
        }
        if success {
            self.txn.commit(self.durability)
        } else {
            self.txn.abort()
        }
    }
}
