// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction layer: handle lifecycle, durability policy, locking.
//!
//! A [`Transaction`] handle is obtained from
//! [`Environment::begin_transaction`](crate::env::Environment::begin_transaction)
//! and driven to exactly one terminal operation. The durability a commit
//! must satisfy is resolved once, at commit time, from (in order of
//! precedence) an explicit call-site argument, the configuration's
//! explicit [`Durability`], the configuration's deprecated sync flags,
//! and finally the environment default. Mixing the two configuration
//! styles fails immediately.
//!
//! # Example
//!
//! ```no_run
//! use baritedb::env::{Environment, EnvironmentConfig};
//! use baritedb::store::DatabaseConfig;
//! use baritedb::txn::TransactionConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let env = Environment::new(EnvironmentConfig::default());
//! let db = env.open_database("accounts", DatabaseConfig::default())?;
//!
//! let txn = env.begin_transaction(None, TransactionConfig::new())?;
//! db.put(Some(&txn), b"alice", b"100")?;
//! db.put(Some(&txn), b"bob", b"250")?;
//! txn.commit()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod durability;
mod error;
mod handle;
pub(crate) mod internal;
pub(crate) mod lock_table;
pub(crate) mod locker;
pub(crate) mod manager;

pub use config::TransactionConfig;
pub use durability::{Durability, ReplicaAckPolicy, SyncPolicy};
pub use error::TxnError;
pub use handle::Transaction;

/// Unique transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u64);

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
