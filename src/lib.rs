// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! BariteDB: the transactional control layer of an embedded ACID storage
//! engine.
//!
//! This crate governs transaction handle lifecycles and commit durability,
//! bridges internal transactions to an external two-phase-commit (XA)
//! coordinator, and builds two higher-level operations on the same
//! locking/cursor substrate: a crash-safe sequence allocator and a
//! multi-index natural-join cursor.
//!
//! The B-tree page store, write-ahead log, and deadlock detector are
//! collaborators behind the [`store`] and lock-table seams; this crate
//! specifies and exercises their contracts with an in-memory rendition.

pub mod env;
pub mod join;
pub mod sequence;
pub mod store;
pub mod txn;
pub mod xa;

pub use env::{Environment, EnvironmentConfig};
pub use join::{JoinConfig, JoinCursor, JoinError};
pub use sequence::{Sequence, SequenceConfig, SequenceError, SequenceStats, StatsConfig};
pub use store::{Cursor, Database, DatabaseConfig, LockMode, OpStatus};
pub use txn::{
    Durability, ReplicaAckPolicy, SyncPolicy, Transaction, TransactionConfig, TxnError, TxnId,
};
pub use xa::{XaCode, XaEnd, XaEnvironment, XaError, XaPrepare, XaRecoverScan, XaStart, Xid};
