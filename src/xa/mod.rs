// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! XA (two-phase commit) adapter.
//!
//! Exposes an [`Environment`](crate::env::Environment) to an external
//! transaction coordinator as a resource manager. Each global transaction
//! id maps to one internal transaction; a per-worker slot tracks which
//! branch a worker is currently executing under. Protocol-order
//! violations never mutate adapter state and carry standard XA codes.
//!
//! # Example
//!
//! ```no_run
//! use baritedb::env::{Environment, EnvironmentConfig};
//! use baritedb::xa::{XaEnd, XaEnvironment, XaStart, Xid};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let xa = XaEnvironment::new(Environment::new(EnvironmentConfig::default()));
//! let xid = Xid::new(1, b"global".to_vec(), b"branch".to_vec());
//!
//! xa.start(&xid, XaStart::NoFlags)?;
//! // ... work under the branch ...
//! xa.end(&xid, XaEnd::Success)?;
//! xa.prepare(&xid)?;
//! xa.commit(&xid, false)?;
//! # Ok(())
//! # }
//! ```

mod error;
mod resource;
mod xid;

pub use error::{XaCode, XaError};
pub use resource::{XaEnd, XaEnvironment, XaPrepare, XaRecoverScan, XaStart};
pub use xid::Xid;
