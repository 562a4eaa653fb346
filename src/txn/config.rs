// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-transaction configuration.
//!
//! Durability can be requested two ways: the deprecated boolean sync flags
//! (`sync` / `no_sync` / `write_no_sync`) or an explicit [`Durability`]
//! value. The two styles feed the same resolved policy at commit time but
//! may never be mixed on one configuration; every setter validates the
//! combination immediately.

use super::durability::Durability;
use super::error::TxnError;

/// Specifies the attributes of a transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionConfig {
    sync: bool,
    no_sync: bool,
    write_no_sync: bool,
    durability: Option<Durability>,

    no_wait: bool,
    read_uncommitted: bool,
    read_committed: bool,
    serializable_isolation: bool,
}

impl TransactionConfig {
    /// Creates a configuration with the system defaults: durability
    /// resolved from the environment, waiting lock requests, repeatable
    /// read isolation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that commit writes and synchronously flushes the log.
    ///
    /// Fails with [`TxnError::MixedDurabilityApi`] if an explicit
    /// durability was already set.
    pub fn set_sync(&mut self, sync: bool) -> Result<(), TxnError> {
        check_mixed_mode(sync, self.no_sync, self.write_no_sync, self.durability)?;
        self.sync = sync;
        Ok(())
    }

    /// Returns true if the transaction is configured to write and flush on
    /// commit.
    #[inline]
    pub fn sync(&self) -> bool {
        self.sync
    }

    /// Requests that commit neither writes nor flushes the log.
    pub fn set_no_sync(&mut self, no_sync: bool) -> Result<(), TxnError> {
        check_mixed_mode(self.sync, no_sync, self.write_no_sync, self.durability)?;
        self.no_sync = no_sync;
        Ok(())
    }

    /// Returns true if the transaction is configured not to write or flush
    /// on commit.
    #[inline]
    pub fn no_sync(&self) -> bool {
        self.no_sync
    }

    /// Requests that commit writes but does not synchronously flush.
    pub fn set_write_no_sync(&mut self, write_no_sync: bool) -> Result<(), TxnError> {
        check_mixed_mode(self.sync, self.no_sync, write_no_sync, self.durability)?;
        self.write_no_sync = write_no_sync;
        Ok(())
    }

    /// Returns true if the transaction is configured to write without
    /// flushing on commit.
    #[inline]
    pub fn write_no_sync(&self) -> bool {
        self.write_no_sync
    }

    /// Sets an explicit durability policy.
    ///
    /// Fails with [`TxnError::MixedDurabilityApi`] if any deprecated sync
    /// flag was already set.
    pub fn set_durability(&mut self, durability: Option<Durability>) -> Result<(), TxnError> {
        check_mixed_mode(self.sync, self.no_sync, self.write_no_sync, durability)?;
        self.durability = durability;
        Ok(())
    }

    /// Returns the explicit durability, if one was set.
    #[inline]
    pub fn durability(&self) -> Option<Durability> {
        self.durability
    }

    /// Configures lock requests to fail immediately instead of waiting.
    pub fn set_no_wait(&mut self, no_wait: bool) {
        self.no_wait = no_wait;
    }

    /// Returns true if lock requests fail instead of waiting.
    #[inline]
    pub fn no_wait(&self) -> bool {
        self.no_wait
    }

    /// Configures reads to return modified but uncommitted data.
    pub fn set_read_uncommitted(&mut self, read_uncommitted: bool) {
        self.read_uncommitted = read_uncommitted;
    }

    /// Returns true if reads may return uncommitted data.
    #[inline]
    pub fn read_uncommitted(&self) -> bool {
        self.read_uncommitted
    }

    /// Configures read committed (degree 2) isolation: read locks are
    /// released as soon as the read completes.
    pub fn set_read_committed(&mut self, read_committed: bool) {
        self.read_committed = read_committed;
    }

    /// Returns true if the transaction uses read committed isolation.
    #[inline]
    pub fn read_committed(&self) -> bool {
        self.read_committed
    }

    /// Configures serializable (degree 3) isolation. The locking
    /// collaborator is responsible for phantom prevention; this layer only
    /// passes the request through.
    pub fn set_serializable_isolation(&mut self, serializable: bool) {
        self.serializable_isolation = serializable;
    }

    /// Returns true if serializable isolation was requested.
    #[inline]
    pub fn serializable_isolation(&self) -> bool {
        self.serializable_isolation
    }

    /// Maps the deprecated sync flags to the equivalent durability. The
    /// most stringent flag wins; no flag at all means full sync.
    pub(crate) fn durability_from_sync(&self) -> Durability {
        if self.sync {
            Durability::SYNC
        } else if self.write_no_sync {
            Durability::WRITE_NO_SYNC
        } else if self.no_sync {
            Durability::NO_SYNC
        } else {
            Durability::SYNC
        }
    }

    /// True if any deprecated sync flag is set.
    pub(crate) fn uses_sync_api(&self) -> bool {
        self.sync || self.no_sync || self.write_no_sync
    }
}

/// Rejects configurations that mix the deprecated and the explicit
/// durability APIs. The arguments are the new state, before it is applied.
fn check_mixed_mode(
    sync: bool,
    no_sync: bool,
    write_no_sync: bool,
    durability: Option<Durability>,
) -> Result<(), TxnError> {
    if (sync || no_sync || write_no_sync) && durability.is_some() {
        return Err(TxnError::MixedDurabilityApi);
    }
    Ok(())
}
