// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Environment: the root handle of the engine.
//!
//! An [`Environment`] owns the database registry, the transaction manager
//! (including the XA binding table), and the shared defaults for
//! durability and timeouts. Invalidation is sticky and environment-wide:
//! once any component observes evidence the environment is unusable,
//! every other handle fails identically.

mod config;
mod environment;

pub use config::EnvironmentConfig;
pub use environment::Environment;

pub(crate) use environment::EnvInner;
