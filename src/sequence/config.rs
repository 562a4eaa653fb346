// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Sequence configuration.

/// Configuration for opening a [`Sequence`](super::Sequence).
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    allow_create: bool,
    exclusive_create: bool,
    decrement: bool,
    auto_commit_no_sync: bool,
    wrap: bool,
    cache_size: i64,
    range_min: i64,
    range_max: i64,
    initial_value: i64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            allow_create: false,
            exclusive_create: false,
            decrement: false,
            auto_commit_no_sync: false,
            wrap: false,
            cache_size: 0,
            range_min: i64::MIN,
            range_max: i64::MAX,
            initial_value: 0,
        }
    }
}

impl SequenceConfig {
    /// Creates a configuration with the system defaults: the full signed
    /// 64-bit range, no caching, incrementing, no wrap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the sequence record if it does not already exist.
    pub fn with_allow_create(mut self, allow_create: bool) -> Self {
        self.allow_create = allow_create;
        self
    }

    /// Fails the open if the sequence record already exists.
    pub fn with_exclusive_create(mut self, exclusive_create: bool) -> Self {
        self.exclusive_create = exclusive_create;
        self
    }

    /// Allocates values downward from the top of the range.
    pub fn with_decrement(mut self, decrement: bool) -> Self {
        self.decrement = decrement;
        self
    }

    /// Configures the auto-commit units of work used by sequence updates
    /// to skip the synchronous log flush.
    pub fn with_auto_commit_no_sync(mut self, auto_commit_no_sync: bool) -> Self {
        self.auto_commit_no_sync = auto_commit_no_sync;
        self
    }

    /// Wraps to the opposite range boundary instead of overflowing.
    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    /// Number of values a handle claims from storage per refill.
    pub fn with_cache_size(mut self, cache_size: i64) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// The closed range of values the sequence may return. Only effective
    /// while the sequence record is being created.
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range_min = min;
        self.range_max = max;
        self
    }

    /// The first value the sequence returns. Only effective while the
    /// sequence record is being created.
    pub fn with_initial_value(mut self, initial_value: i64) -> Self {
        self.initial_value = initial_value;
        self
    }

    #[inline]
    pub fn allow_create(&self) -> bool {
        self.allow_create
    }

    #[inline]
    pub fn exclusive_create(&self) -> bool {
        self.exclusive_create
    }

    #[inline]
    pub fn decrement(&self) -> bool {
        self.decrement
    }

    #[inline]
    pub fn auto_commit_no_sync(&self) -> bool {
        self.auto_commit_no_sync
    }

    #[inline]
    pub fn wrap(&self) -> bool {
        self.wrap
    }

    #[inline]
    pub fn cache_size(&self) -> i64 {
        self.cache_size
    }

    #[inline]
    pub fn range_min(&self) -> i64 {
        self.range_min
    }

    #[inline]
    pub fn range_max(&self) -> i64 {
        self.range_max
    }

    #[inline]
    pub fn initial_value(&self) -> i64 {
        self.initial_value
    }
}
