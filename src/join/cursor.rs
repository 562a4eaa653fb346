// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Natural-join cursor over sorted secondary duplicate sets.
//!
//! Duplicates are sorted and duplicate-duplicates cannot exist, so the
//! join walks the duplicates of the first cursor as candidates and probes
//! each remaining cursor for the exact `(secondary key, candidate)` pair,
//! never resetting any cursor to the start of its duplicate set. That is
//! what keeps the scan linear instead of a cross product.
//!
//! All participating cursors must share one duplicate-comparison
//! ordering; this is the caller's responsibility and is not validated.

use tracing::trace;

use crate::store::{Cursor, Database, LockMode};
use crate::txn::TxnError;

use super::config::JoinConfig;

/// Errors raised by join operations.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// The join cursor was already closed.
    #[error("join cursor is already closed")]
    AlreadyClosed,

    /// A secondary index referenced a primary key that does not exist.
    /// Not retryable: it indicates corruption elsewhere.
    #[error("secondary index is corrupt: the primary record is missing")]
    SecondaryCorrupt,

    /// A caller violated an API contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A transaction or locking failure.
    #[error(transparent)]
    Txn(#[from] TxnError),
}

/// A cursor yielding the natural join of several secondary duplicate
/// sets, one primary key per call.
pub struct JoinCursor {
    config: JoinConfig,
    primary: Database,
    pri_cursor: Option<Cursor>,
    sec_cursors: Vec<Cursor>,
    /// Each secondary cursor's key, captured on the first retrieval.
    sec_keys: Vec<Vec<u8>>,
    started: bool,
    closed: bool,
}

impl JoinCursor {
    pub(crate) fn open(
        primary: Database,
        cursors: &[&Cursor],
        config: &JoinConfig,
    ) -> Result<Self, JoinError> {
        if cursors.is_empty() {
            return Err(JoinError::InvalidArgument(
                "at least one secondary cursor is required",
            ));
        }
        let env = primary.environment().map_err(JoinError::Txn)?;
        env.check_valid().map_err(JoinError::Txn)?;

        // Sort ascending by duplicate count so the smallest fanout
        // proposes candidates. Counts are collected once, with
        // read-uncommitted reads to avoid blocking writers, and the sort
        // is a stable sort over those precomputed counts.
        let mut order: Vec<usize> = (0..cursors.len()).collect();
        if !config.no_sort() {
            let mut counts = Vec::with_capacity(cursors.len());
            for cursor in cursors {
                counts.push(cursor.count(LockMode::ReadUncommitted)?);
            }
            order.sort_by_key(|&i| counts[i]);
        }

        // Duplicate the secondary cursors last; on error the ones already
        // created close themselves on drop.
        let locker = cursors[0].locker().clone();
        let mut sec_cursors = Vec::with_capacity(cursors.len());
        for &i in &order {
            sec_cursors.push(cursors[i].dup()?);
        }
        let pri_cursor = Cursor::new(primary.clone(), locker);

        Ok(Self {
            config: config.clone(),
            primary,
            pri_cursor: Some(pri_cursor),
            sec_cursors,
            sec_keys: Vec::new(),
            started: false,
            closed: false,
        })
    }

    /// The primary database the join resolves into.
    #[inline]
    pub fn database(&self) -> &Database {
        &self.primary
    }

    /// The configuration the join was opened with.
    #[inline]
    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Returns the next primary key on which every secondary cursor
    /// agrees, or `None` when the join is exhausted. Exhaustion is
    /// terminal; restart by opening a new join cursor.
    pub fn get_next(&mut self, mode: LockMode) -> Result<Option<Vec<u8>>, JoinError> {
        self.retrieve_next(mode, false)
            .map(|found| found.map(|(key, _)| key))
    }

    /// Like [`get_next`](Self::get_next), additionally fetching the
    /// primary record for the matched key.
    pub fn get_next_with_data(
        &mut self,
        mode: LockMode,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, JoinError> {
        self.retrieve_next(mode, true).map(|found| {
            found.map(|(key, data)| (key, data.unwrap_or_default()))
        })
    }

    fn retrieve_next(
        &mut self,
        mode: LockMode,
        fetch_data: bool,
    ) -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>, JoinError> {
        if self.closed {
            return Err(JoinError::AlreadyClosed);
        }

        // First retrieval: capture each cursor's key at its current
        // position; the first cursor's current data is the first
        // candidate. A cursor whose record vanished has an empty
        // duplicate set, so the join is empty.
        let mut candidate = None;
        if !self.started {
            self.started = true;
            for (i, cursor) in self.sec_cursors.iter().enumerate() {
                match cursor.current(mode)? {
                    Some((key, data)) => {
                        self.sec_keys.push(key);
                        if i == 0 {
                            candidate = Some(data);
                        }
                    }
                    None => return Ok(None),
                }
            }
        }

        'candidates: loop {
            let key = match candidate.take() {
                Some(first) => first,
                None => match self.sec_cursors[0].next_dup(mode)? {
                    Some((_, data)) => data,
                    None => return Ok(None),
                },
            };

            // Every other cursor must confirm the exact pair; a miss just
            // moves on to the next candidate.
            for i in 1..self.sec_cursors.len() {
                let sec_key = self.sec_keys[i].clone();
                if !self.sec_cursors[i].search_both(&sec_key, &key, mode)? {
                    trace!(candidate = ?key, cursor = i, "join candidate rejected");
                    continue 'candidates;
                }
            }

            let data = if fetch_data {
                let pri = match self.pri_cursor.as_mut() {
                    Some(pri) => pri,
                    None => return Err(JoinError::AlreadyClosed),
                };
                match pri.search_key(&key, mode)? {
                    Some(data) => Some(data),
                    // The secondary index guaranteed the record existed.
                    None => return Err(JoinError::SecondaryCorrupt),
                }
            } else {
                None
            };
            trace!(key = ?key, "join match");
            return Ok(Some((key, data)));
        }
    }

    /// Closes the primary cursor and every secondary duplicate this join
    /// created, never the caller-supplied cursors. Attempts every close
    /// and surfaces only the first failure.
    pub fn close(&mut self) -> Result<(), JoinError> {
        if self.closed {
            return Err(JoinError::AlreadyClosed);
        }
        self.closed = true;

        let mut first_failure: Option<TxnError> = None;
        if let Some(mut pri) = self.pri_cursor.take() {
            if let Err(e) = pri.close() {
                first_failure = Some(e);
            }
        }
        for cursor in &mut self.sec_cursors {
            if let Err(e) = cursor.close() {
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
        match first_failure {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }

    #[cfg(test)]
    fn secondary_cursors(&self) -> &[Cursor] {
        &self.sec_cursors
    }
}
