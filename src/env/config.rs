// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Environment configuration.

use std::time::Duration;

use crate::txn::Durability;

/// Configuration for an [`Environment`](super::Environment).
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Durability applied to commits that resolve no more specific policy.
    pub durability: Durability,
    /// Default bound on any single lock wait.
    pub lock_timeout: Duration,
    /// Default bound on how long a transaction may stay open
    /// (None = unbounded).
    pub txn_timeout: Option<Duration>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            durability: Durability::SYNC,
            lock_timeout: Duration::from_millis(500),
            txn_timeout: None,
        }
    }
}

impl EnvironmentConfig {
    /// Creates a configuration with the system defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default commit durability.
    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Sets the default lock-wait timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the default transaction timeout.
    pub fn with_txn_timeout(mut self, timeout: Duration) -> Self {
        self.txn_timeout = Some(timeout);
        self
    }
}
