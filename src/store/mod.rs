// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Sorted key/duplicate-set storage substrate.
//!
//! This module is the crate's stand-in for the B-tree collaborator: a
//! [`Database`] of sorted keys with sorted duplicate sets, and a
//! positioned [`Cursor`] with explicit search modes and per-read lock
//! modes. Reads copy into owned buffers at the boundary; writes acquire
//! exclusive locks through the owning transaction and record undo
//! information so aborts can unwind them.

mod cursor;
mod database;

pub use cursor::{Cursor, LockMode, OpStatus};
pub use database::{Database, DatabaseConfig};
