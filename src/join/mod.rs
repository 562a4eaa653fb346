// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Equality joins over secondary indexes.
//!
//! A [`JoinCursor`] computes the natural join of several sorted secondary
//! duplicate sets and yields matching primary keys one at a time, without
//! materializing the result.
//!
//! # Example
//!
//! ```no_run
//! use baritedb::env::{Environment, EnvironmentConfig};
//! use baritedb::join::JoinConfig;
//! use baritedb::store::{DatabaseConfig, LockMode};
//! use baritedb::txn::TransactionConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let env = Environment::new(EnvironmentConfig::default());
//! let primary = env.open_database("people", DatabaseConfig::default())?;
//! let by_city = env.open_database(
//!     "people-by-city",
//!     DatabaseConfig::new().with_sorted_duplicates(true),
//! )?;
//! let by_title = env.open_database(
//!     "people-by-title",
//!     DatabaseConfig::new().with_sorted_duplicates(true),
//! )?;
//!
//! let txn = env.begin_transaction(None, TransactionConfig::new())?;
//! let mut city = by_city.open_cursor(Some(&txn))?;
//! city.search_key(b"helsinki", LockMode::Default)?;
//! let mut title = by_title.open_cursor(Some(&txn))?;
//! title.search_key(b"engineer", LockMode::Default)?;
//!
//! let mut join = primary.join(&[&city, &title], &JoinConfig::new())?;
//! while let Some(key) = join.get_next(LockMode::Default)? {
//!     // every engineer in Helsinki
//!     let _ = key;
//! }
//! join.close()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod cursor;

pub use config::JoinConfig;
pub use cursor::{JoinCursor, JoinError};

use crate::store::{Cursor, Database};

impl Database {
    /// Opens a join cursor over this (primary) database, driven by the
    /// given positioned secondary cursors. The cursors stay owned by the
    /// caller and are never closed by the join.
    pub fn join(&self, cursors: &[&Cursor], config: &JoinConfig) -> Result<JoinCursor, JoinError> {
        JoinCursor::open(self.clone(), cursors, config)
    }
}
