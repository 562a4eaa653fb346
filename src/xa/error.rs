// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! XA error taxonomy.
//!
//! An external coordinator sees only these errors; internal failures are
//! wrapped with their cause attached. Each error maps to a standard XA
//! status code via [`XaError::code`].

use crate::txn::TxnError;

use super::xid::Xid;

/// Standard XA status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XaCode {
    /// XAER_DUPID: the xid is already bound.
    DupId,
    /// XAER_NOTA: no binding exists for the xid.
    NoTxn,
    /// XAER_PROTO: the call violates the protocol ordering.
    Proto,
    /// XA_RBROLLBACK: the branch was marked abort-only and must be rolled
    /// back.
    RbRollback,
    /// XAER_RMERR: an internal resource-manager failure.
    RmErr,
}

/// Errors raised by the XA adapter.
#[derive(Debug, thiserror::Error)]
pub enum XaError {
    /// A no-flags `start` found the xid already bound.
    #[error("transaction already exists for xid {xid}")]
    DuplicateId { xid: Xid },

    /// No transaction is bound to the xid.
    #[error("no transaction found for xid {xid}")]
    NoTransaction { xid: Xid },

    /// The call arrived in a state the protocol does not allow.
    #[error("protocol violation: {reason}")]
    Protocol { reason: &'static str },

    /// The branch was marked abort-only; the coordinator must roll back.
    #[error("transaction for xid {xid} must be rolled back")]
    RollbackRequired { xid: Xid },

    /// An internal failure, surfaced in the XA taxonomy with its cause.
    #[error("resource manager failure")]
    ResourceManager {
        #[from]
        source: TxnError,
    },
}

impl XaError {
    /// The standard XA status code for this error.
    pub fn code(&self) -> XaCode {
        match self {
            XaError::DuplicateId { .. } => XaCode::DupId,
            XaError::NoTransaction { .. } => XaCode::NoTxn,
            XaError::Protocol { .. } => XaCode::Proto,
            XaError::RollbackRequired { .. } => XaCode::RbRollback,
            XaError::ResourceManager { .. } => XaCode::RmErr,
        }
    }
}
