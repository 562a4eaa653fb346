// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Join configuration.

/// Configuration for a [`JoinCursor`](super::JoinCursor).
#[derive(Debug, Clone, Default)]
pub struct JoinConfig {
    no_sort: bool,
}

impl JoinConfig {
    /// Creates a configuration with the system defaults: secondary
    /// cursors are sorted ascending by duplicate count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables the automatic fanout sort, keeping the caller-supplied
    /// cursor order.
    pub fn with_no_sort(mut self, no_sort: bool) -> Self {
        self.no_sort = no_sort;
        self
    }

    /// True if the caller-supplied cursor order is kept as-is.
    #[inline]
    pub fn no_sort(&self) -> bool {
        self.no_sort
    }
}
