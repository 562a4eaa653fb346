// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Crash-safe counter allocation.
//!
//! A [`Sequence`] hands out monotonic (or anti-monotonic) counter values
//! backed by a single database record, claiming ranges of values per
//! persisted update so most allocations cost no I/O.
//!
//! # Example
//!
//! ```no_run
//! use baritedb::env::{Environment, EnvironmentConfig};
//! use baritedb::sequence::SequenceConfig;
//! use baritedb::store::DatabaseConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let env = Environment::new(EnvironmentConfig::default());
//! let db = env.open_database("ids", DatabaseConfig::default())?;
//!
//! let config = SequenceConfig::new()
//!     .with_allow_create(true)
//!     .with_cache_size(100);
//! let seq = db.open_sequence(None, b"order-ids", &config)?;
//! let id = seq.get(None, 1)?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

mod config;
#[allow(clippy::module_inception)]
mod sequence;
mod stats;

pub use config::SequenceConfig;
pub use sequence::{Sequence, SequenceError};
pub use stats::{SequenceStats, StatsConfig};

use crate::store::Database;
use crate::txn::Transaction;

impl Database {
    /// Opens a sequence handle stored under `key` in this database,
    /// creating the record when the configuration allows it. Not
    /// permitted on databases configured for duplicates.
    pub fn open_sequence(
        &self,
        txn: Option<&Transaction>,
        key: &[u8],
        config: &SequenceConfig,
    ) -> Result<Sequence, SequenceError> {
        Sequence::open(self.clone(), txn, key, config)
    }
}
