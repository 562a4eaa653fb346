// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Sequence statistics.

/// Controls how [`Sequence::stats`](super::Sequence::stats) gathers its
/// snapshot.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    fast: bool,
    clear: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            fast: true,
            clear: false,
        }
    }
}

impl StatsConfig {
    /// Creates a configuration with the defaults: fast (no I/O), counters
    /// preserved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast mode reports the handle's last-seen persisted value without
    /// I/O; slow mode re-reads the record with a non-blocking read.
    pub fn with_fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    /// Resets the handle's counters after the snapshot is taken.
    pub fn with_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    #[inline]
    pub fn fast(&self) -> bool {
        self.fast
    }

    #[inline]
    pub fn clear(&self) -> bool {
        self.clear
    }
}

/// A snapshot of one sequence handle's counters and cache state.
#[derive(Debug, Clone)]
pub struct SequenceStats {
    /// Total `get` calls on this handle.
    pub n_gets: u64,
    /// `get` calls satisfied from the handle cache without I/O.
    pub n_cached_gets: u64,
    /// The persisted value as last seen by this handle.
    pub current: i64,
    /// The next value this handle's cache will return.
    pub value: i64,
    /// The last value claimed by this handle's cache.
    pub last_value: i64,
    /// Lower bound of the configured range.
    pub range_min: i64,
    /// Upper bound of the configured range.
    pub range_max: i64,
    /// Values claimed per refill.
    pub cache_size: i64,
}
