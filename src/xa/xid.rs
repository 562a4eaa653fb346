// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Global transaction identifiers.

/// A global transaction identifier assigned by an external two-phase
/// commit coordinator: format id, global transaction id, and branch
/// qualifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Xid {
    format_id: i32,
    global_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

impl Xid {
    /// Creates an identifier from its three components.
    pub fn new(format_id: i32, global_id: Vec<u8>, branch_qualifier: Vec<u8>) -> Self {
        Self {
            format_id,
            global_id,
            branch_qualifier,
        }
    }

    /// The coordinator-assigned format identifier.
    #[inline]
    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    /// The global transaction id component.
    #[inline]
    pub fn global_id(&self) -> &[u8] {
        &self.global_id
    }

    /// The branch qualifier component.
    #[inline]
    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }
}

fn write_hex(f: &mut std::fmt::Formatter<'_>, bytes: &[u8]) -> std::fmt::Result {
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

impl std::fmt::Display for Xid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.format_id)?;
        write_hex(f, &self.global_id)?;
        write!(f, ":")?;
        write_hex(f, &self.branch_qualifier)
    }
}

impl std::fmt::Debug for Xid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Xid({})", self)
    }
}
