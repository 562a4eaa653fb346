// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Durability policy for transaction commits.
//!
//! A [`Durability`] combines the local log-flush behavior with the
//! acknowledgment requirements placed on replicas. On a standalone
//! environment only the local [`SyncPolicy`] matters; in a replicated
//! deployment the overall guarantee is additionally a function of the
//! [`ReplicaAckPolicy`] and the sync policy each replica applies while
//! replaying the commit.

/// Synchronization policy applied to the local log when a transaction
/// commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncPolicy {
    /// Write and synchronously flush the log on commit. Full ACID.
    #[default]
    Sync,
    /// Neither write nor flush the log on commit. A crash of the process
    /// or the operating system may undo the most recent commits.
    NoSync,
    /// Write but do not synchronously flush. Only an operating system
    /// failure can undo the most recent commits.
    WriteNoSync,
}

/// How many replicas must acknowledge a commit before it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplicaAckPolicy {
    /// Every replica in the group must acknowledge.
    All,
    /// No acknowledgments are required.
    None,
    /// A simple majority must acknowledge, so the transaction survives
    /// any election.
    #[default]
    Quorum,
}

impl ReplicaAckPolicy {
    /// Returns the minimum number of nodes needed to satisfy this policy
    /// for a replication group of `group_size` members.
    pub fn required_nodes(self, group_size: usize) -> usize {
        match self {
            ReplicaAckPolicy::All => group_size,
            ReplicaAckPolicy::None => 1,
            ReplicaAckPolicy::Quorum => {
                if group_size <= 2 {
                    1
                } else {
                    group_size / 2 + 1
                }
            }
        }
    }
}

/// The overall durability guarantee a commit must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Durability {
    local_sync: SyncPolicy,
    replica_sync: SyncPolicy,
    replica_ack: ReplicaAckPolicy,
}

impl Durability {
    /// Flush locally and on replicas, quorum acknowledgment.
    pub const SYNC: Durability = Durability {
        local_sync: SyncPolicy::Sync,
        replica_sync: SyncPolicy::Sync,
        replica_ack: ReplicaAckPolicy::Quorum,
    };

    /// No local flush, quorum acknowledgment.
    pub const NO_SYNC: Durability = Durability {
        local_sync: SyncPolicy::NoSync,
        replica_sync: SyncPolicy::Sync,
        replica_ack: ReplicaAckPolicy::Quorum,
    };

    /// Local write without flush, quorum acknowledgment.
    pub const WRITE_NO_SYNC: Durability = Durability {
        local_sync: SyncPolicy::WriteNoSync,
        replica_sync: SyncPolicy::Sync,
        replica_ack: ReplicaAckPolicy::Quorum,
    };

    /// Creates a durability specification.
    pub fn new(
        local_sync: SyncPolicy,
        replica_sync: SyncPolicy,
        replica_ack: ReplicaAckPolicy,
    ) -> Self {
        Self {
            local_sync,
            replica_sync,
            replica_ack,
        }
    }

    /// The sync policy applied to the local log at commit.
    #[inline]
    pub fn local_sync(&self) -> SyncPolicy {
        self.local_sync
    }

    /// The sync policy a replica applies while replaying a commit that
    /// needs acknowledgment.
    #[inline]
    pub fn replica_sync(&self) -> SyncPolicy {
        self.replica_sync
    }

    /// The acknowledgment policy used when committing to a replicated
    /// group.
    #[inline]
    pub fn replica_ack(&self) -> ReplicaAckPolicy {
        self.replica_ack
    }
}
