// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction error types.

use super::TxnId;

/// Errors that can occur in transaction and cursor operations.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    /// The handle's terminal operation already ran; only the id remains
    /// usable.
    #[error("transaction {id} has been closed and is no longer usable")]
    Closed { id: TxnId },

    /// The environment was invalidated; every handle fails the same way.
    #[error("environment is invalid: {reason}")]
    EnvironmentInvalid { reason: String },

    /// Deprecated boolean sync flags and an explicit durability were mixed
    /// on the same configuration or across the commit call-site and the
    /// stored configuration.
    #[error("mixed use of deprecated sync flags and explicit durability is not supported")]
    MixedDurabilityApi,

    /// The transaction was marked abort-only and can no longer commit.
    #[error("transaction {id} is configured abort-only and must be rolled back")]
    AbortOnly { id: TxnId },

    /// Cursors opened under the transaction were still open at commit.
    #[error("transaction {id} still has {count} open cursors")]
    CursorsOpen { id: TxnId, count: usize },

    /// The transaction has unresolved child transactions at commit.
    #[error("transaction {id} has unresolved child transactions")]
    UnresolvedChildren { id: TxnId },

    /// A lock wait exceeded the lock timeout. Retryable.
    #[error("lock wait timed out after {waited_ms} ms")]
    LockTimeout { waited_ms: u64 },

    /// The transaction exceeded its own timeout while waiting for a lock.
    /// Retryable only as a new transaction.
    #[error("transaction {id} timed out")]
    TxnTimeout { id: TxnId },

    /// A deadlock was detected at a lock-wait point. Retryable.
    #[error("deadlock detected while locking")]
    Deadlock,

    /// A no-wait lock request could not be granted immediately. Retryable.
    #[error("lock not granted and no-wait was requested")]
    LockNotGranted,

    /// A caller violated an API contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl TxnError {
    /// True for lock-contention errors that a caller may retry after
    /// backing off; the engine never retries them itself.
    pub fn is_lock_conflict(&self) -> bool {
        matches!(
            self,
            TxnError::LockTimeout { .. }
                | TxnError::TxnTimeout { .. }
                | TxnError::Deadlock
                | TxnError::LockNotGranted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_conflict_classification() {
        assert!(TxnError::LockTimeout { waited_ms: 10 }.is_lock_conflict());
        assert!(TxnError::TxnTimeout { id: TxnId(1) }.is_lock_conflict());
        assert!(TxnError::Deadlock.is_lock_conflict());
        assert!(TxnError::LockNotGranted.is_lock_conflict());
        assert!(!TxnError::Closed { id: TxnId(1) }.is_lock_conflict());
        assert!(!TxnError::MixedDurabilityApi.is_lock_conflict());
    }
}
