// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Crash-safe, cache-assisted counter allocator.
//!
//! A sequence is one record in a database. A handle claims ranges of
//! values from the record under a read-modify-write lock and serves them
//! from a local cache, so the persisted value is only updated once per
//! `cache_size` allocations. The persisted value is always the next value
//! any handle must fetch once its cache runs dry, which is what keeps
//! concurrent handles on the same key disjoint.
//!
//! Range arithmetic runs in `i128`: the configured range may span the
//! whole `i64` domain, so differences do not fit the counter type itself.

use parking_lot::Mutex;
use tracing::{instrument, trace};

use crate::store::{Cursor, Database, LockMode, OpStatus};
use crate::txn::locker::Locker;
use crate::txn::{Transaction, TransactionConfig, TxnError};

use super::config::SequenceConfig;
use super::stats::{SequenceStats, StatsConfig};

const FLAG_INCR: u8 = 0x1;
const FLAG_WRAP: u8 = 0x2;
const FLAG_OVER: u8 = 0x4;

/// Allocation size for the record data; the encoding uses less and the
/// trailing bytes are never written.
const MAX_DATA_SIZE: usize = 50;
const RECORD_LEN: usize = 26;

/// Version of the record format.
const CURRENT_VERSION: u8 = 0;

/// Errors raised by sequence operations.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    /// A configuration or call argument violates the contract.
    #[error("invalid sequence argument: {0}")]
    InvalidArgument(&'static str),

    /// Exclusive create was requested but the record already exists.
    #[error("exclusive create was requested and the sequence record already exists")]
    RecordExists,

    /// The record does not exist and create was not allowed.
    #[error("create was not allowed and the sequence record does not exist")]
    RecordMissing,

    /// The record was deleted while a handle was open on it.
    #[error("the sequence record was deleted while it was open")]
    RecordDeleted,

    /// The stored record bytes cannot be decoded.
    #[error("corrupt sequence record: {0}")]
    Corrupt(&'static str),

    /// The sequence exhausted its range without wrap permission. Sticky:
    /// every subsequent `get` fails the same way until the record is
    /// reconfigured externally.
    #[error("sequence overflowed its range at {value}")]
    Overflow { value: i64 },

    /// A transaction or locking failure.
    #[error(transparent)]
    Txn(#[from] TxnError),
}

/// Persisted fields of the sequence record.
#[derive(Debug, Clone, Copy)]
struct PersistedRecord {
    increment: bool,
    wrap_allowed: bool,
    overflow: bool,
    range_min: i64,
    range_max: i64,
    stored_value: i64,
}

impl PersistedRecord {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAX_DATA_SIZE);
        let mut flags = 0u8;
        if self.increment {
            flags |= FLAG_INCR;
        }
        if self.wrap_allowed {
            flags |= FLAG_WRAP;
        }
        if self.overflow {
            flags |= FLAG_OVER;
        }
        buf.push(CURRENT_VERSION);
        buf.push(flags);
        buf.extend_from_slice(&self.range_min.to_be_bytes());
        buf.extend_from_slice(&self.range_max.to_be_bytes());
        buf.extend_from_slice(&self.stored_value.to_be_bytes());
        debug_assert_eq!(buf.len(), RECORD_LEN);
        buf
    }

    fn decode(data: &[u8]) -> Result<Self, SequenceError> {
        if data.len() < RECORD_LEN {
            return Err(SequenceError::Corrupt("record is too short"));
        }
        // The version byte is read but not interpreted at version 0.
        let _version = data[0];
        let flags = data[1];
        let read_i64 = |offset: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[offset..offset + 8]);
            i64::from_be_bytes(bytes)
        };
        Ok(Self {
            increment: flags & FLAG_INCR != 0,
            wrap_allowed: flags & FLAG_WRAP != 0,
            overflow: flags & FLAG_OVER != 0,
            range_min: read_i64(2),
            range_max: read_i64(10),
            stored_value: read_i64(18),
        })
    }
}

/// Handle-local state: the persisted fields as last seen, plus the cache
/// of values already claimed from storage but not yet handed out. Cache
/// bounds live in `i128` so claims touching the `i64` boundaries cannot
/// overflow.
struct SeqState {
    record: PersistedRecord,
    cache_value: i128,
    cache_last: i128,
    n_gets: u64,
    n_cached_gets: u64,
}

enum RefillOutcome {
    Refilled,
    /// The range is exhausted; the sticky overflow flag was persisted.
    Overflowed,
}

/// A sequence handle.
///
/// `get` is serialized per handle; separate handles on the same key
/// increase concurrency and stay disjoint through the record lock taken
/// during refills.
pub struct Sequence {
    db: Database,
    key: Vec<u8>,
    cache_size: i64,
    auto_commit_config: Option<TransactionConfig>,
    state: Mutex<SeqState>,
}

impl Sequence {
    pub(crate) fn open(
        db: Database,
        txn: Option<&Transaction>,
        key: &[u8],
        config: &SequenceConfig,
    ) -> Result<Self, SequenceError> {
        if db.config().sorted_duplicates() {
            return Err(SequenceError::InvalidArgument(
                "sequences are not supported in databases configured for duplicates",
            ));
        }
        if config.range_min() >= config.range_max() {
            return Err(SequenceError::InvalidArgument(
                "minimum sequence value must be less than the maximum",
            ));
        }
        if config.initial_value() < config.range_min()
            || config.initial_value() > config.range_max()
        {
            return Err(SequenceError::InvalidArgument(
                "initial sequence value is out of range",
            ));
        }
        if config.cache_size() < 0 {
            return Err(SequenceError::InvalidArgument(
                "cache size cannot be negative",
            ));
        }
        if config.cache_size() as i128
            > config.range_max() as i128 - config.range_min() as i128
        {
            return Err(SequenceError::InvalidArgument(
                "the cache size is larger than the sequence range",
            ));
        }

        let auto_commit_config = if config.auto_commit_no_sync() {
            let mut c = TransactionConfig::new();
            c.set_no_sync(true)?;
            Some(c)
        } else {
            None
        };

        let env = db.environment()?;
        let locker = Locker::writable(&env, txn, auto_commit_config.as_ref())?;
        let mut cursor = Cursor::new(db.clone(), locker.clone());

        let result = Self::open_record(&mut cursor, key, config);

        let _ = cursor.close();
        let end = locker.operation_end(result.is_ok());
        let record = result?;
        end?;

        // The cache starts empty so the first get performs a fetch.
        let cache_value = record.stored_value as i128;
        let cache_last = if record.increment {
            cache_value - 1
        } else {
            cache_value + 1
        };
        Ok(Self {
            db,
            key: key.to_vec(),
            cache_size: config.cache_size(),
            auto_commit_config,
            state: Mutex::new(SeqState {
                record,
                cache_value,
                cache_last,
                n_gets: 0,
                n_cached_gets: 0,
            }),
        })
    }

    fn open_record(
        cursor: &mut Cursor,
        key: &[u8],
        config: &SequenceConfig,
    ) -> Result<PersistedRecord, SequenceError> {
        if config.allow_create() {
            let record = PersistedRecord {
                increment: !config.decrement(),
                wrap_allowed: config.wrap(),
                overflow: false,
                range_min: config.range_min(),
                range_max: config.range_max(),
                stored_value: config.initial_value(),
            };
            // Try the insert first to avoid depending on serializable
            // isolation; fall back to reading the existing record.
            match cursor.put_no_overwrite(key, &record.encode())? {
                OpStatus::Success => Ok(record),
                OpStatus::KeyExist => {
                    if config.exclusive_create() {
                        return Err(SequenceError::RecordExists);
                    }
                    Self::read_record(cursor, key, LockMode::Default)?
                        .ok_or(SequenceError::RecordDeleted)
                }
                OpStatus::NotFound => Err(SequenceError::Corrupt(
                    "unexpected status from sequence insert",
                )),
            }
        } else {
            Self::read_record(cursor, key, LockMode::Default)?
                .ok_or(SequenceError::RecordMissing)
        }
    }

    fn read_record(
        cursor: &mut Cursor,
        key: &[u8],
        mode: LockMode,
    ) -> Result<Option<PersistedRecord>, SequenceError> {
        match cursor.search_key(key, mode)? {
            Some(data) => Ok(Some(PersistedRecord::decode(&data)?)),
            None => Ok(None),
        }
    }

    /// Returns the next `delta` values as one allocation, reporting the
    /// first of them. Serialized against concurrent callers on this
    /// handle. With `txn` the update runs under that transaction;
    /// otherwise each refill is an independent auto-commit unit of work.
    #[instrument(level = "trace", name = "sequence_get", skip(self, txn))]
    pub fn get(&self, txn: Option<&Transaction>, delta: i64) -> Result<i64, SequenceError> {
        if delta <= 0 {
            return Err(SequenceError::InvalidArgument(
                "sequence delta must be greater than zero",
            ));
        }

        let mut state = self.state.lock();
        if delta as i128
            > state.record.range_max as i128 - state.record.range_min as i128
        {
            return Err(SequenceError::InvalidArgument(
                "sequence delta is larger than the range",
            ));
        }

        let mut cached = true;
        let mut wrapped = false;

        let remaining = if state.record.increment {
            state.cache_last - state.cache_value + 1
        } else {
            state.cache_value - state.cache_last + 1
        };
        if delta as i128 > remaining {
            cached = false;
            self.refill(txn, &mut state, delta, &mut wrapped)?;
        }

        let value = state.cache_value as i64;
        if state.record.increment {
            state.cache_value += delta as i128;
        } else {
            state.cache_value -= delta as i128;
        }

        state.n_gets += 1;
        if cached {
            state.n_cached_gets += 1;
        }
        trace!(value, cached, wrapped, "sequence get");
        Ok(value)
    }

    /// Claims `max(delta, cache_size)` values from the record under a
    /// read-modify-write lock and refills the handle cache with them.
    fn refill(
        &self,
        txn: Option<&Transaction>,
        state: &mut SeqState,
        delta: i64,
        wrapped: &mut bool,
    ) -> Result<(), SequenceError> {
        let env = self.db.environment()?;
        let locker = Locker::writable(&env, txn, self.auto_commit_config.as_ref())?;
        let mut cursor = Cursor::new(self.db.clone(), locker.clone());

        let result = (|| -> Result<RefillOutcome, SequenceError> {
            let persisted = Self::read_record(&mut cursor, &self.key, LockMode::Rmw)?
                .ok_or(SequenceError::RecordDeleted)?;
            state.record = persisted;
            let record = &mut state.record;

            if record.overflow {
                return Err(SequenceError::Overflow {
                    value: record.stored_value,
                });
            }

            let range_size =
                record.range_max as i128 - record.range_min as i128 + 1;
            let mut start = record.stored_value;
            let mut avail = if record.increment {
                record.range_max as i128 - start as i128 + 1
            } else {
                start as i128 - record.range_min as i128 + 1
            };
            let mut adjust = (delta as i128).max(self.cache_size as i128);

            if avail < delta as i128 {
                // The tail cannot serve even one request of this size.
                if record.wrap_allowed {
                    start = if record.increment {
                        record.range_min
                    } else {
                        record.range_max
                    };
                    avail = range_size;
                    *wrapped = true;
                } else {
                    record.overflow = true;
                    cursor.put(&self.key, &record.encode())?;
                    return Ok(RefillOutcome::Overflowed);
                }
            }
            // Never claim past the range boundary just to fill the cache.
            if adjust > avail {
                adjust = avail;
            }

            if adjust == avail {
                // The claim consumes the range up to the boundary; encode
                // what the next fetch must do.
                if record.wrap_allowed {
                    record.stored_value = if record.increment {
                        record.range_min
                    } else {
                        record.range_max
                    };
                    *wrapped = true;
                } else {
                    record.overflow = true;
                    record.stored_value = if record.increment {
                        record.range_max
                    } else {
                        record.range_min
                    };
                }
            } else if record.increment {
                record.stored_value = (start as i128 + adjust) as i64;
            } else {
                record.stored_value = (start as i128 - adjust) as i64;
            }

            cursor.put(&self.key, &record.encode())?;

            // The cache now holds the claimed interval.
            state.cache_value = start as i128;
            state.cache_last = if record.increment {
                start as i128 + adjust - 1
            } else {
                start as i128 - adjust + 1
            };
            Ok(RefillOutcome::Refilled)
        })();

        let _ = cursor.close();
        let end = locker.operation_end(result.is_ok());
        match result {
            Ok(RefillOutcome::Refilled) => {
                end?;
                Ok(())
            }
            Ok(RefillOutcome::Overflowed) => {
                // The sticky flag was committed; the failure is permanent.
                end?;
                Err(SequenceError::Overflow {
                    value: state.record.stored_value,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// A snapshot of this handle's counters and cache. Fast mode performs
    /// no I/O; slow mode re-reads the record with a read-uncommitted read
    /// so it never contends with writers.
    pub fn stats(&self, config: &StatsConfig) -> Result<SequenceStats, SequenceError> {
        let mut state = self.state.lock();

        if !config.fast() {
            let env = self.db.environment()?;
            let locker = Locker::readable(&env, None, true)?;
            let mut cursor = Cursor::new(self.db.clone(), locker.clone());
            let result =
                Self::read_record(&mut cursor, &self.key, LockMode::ReadUncommitted);
            let _ = cursor.close();
            let end = locker.operation_end(result.is_ok());
            state.record = result?.ok_or(SequenceError::RecordDeleted)?;
            end?;
        }

        let stats = SequenceStats {
            n_gets: state.n_gets,
            n_cached_gets: state.n_cached_gets,
            current: state.record.stored_value,
            value: clamp_i64(state.cache_value),
            last_value: clamp_i64(state.cache_last),
            range_min: state.record.range_min,
            range_max: state.record.range_max,
            cache_size: self.cache_size,
        };
        if config.clear() {
            state.n_gets = 0;
            state.n_cached_gets = 0;
        }
        Ok(stats)
    }

    /// The database holding the sequence record.
    #[inline]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// A copy of the key the sequence record is stored under.
    pub fn key(&self) -> Vec<u8> {
        self.key.clone()
    }

    /// Kept for API compatibility; handles hold no resources beyond their
    /// cache.
    pub fn close(&self) {}
}

fn clamp_i64(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Environment, EnvironmentConfig};
    use crate::store::DatabaseConfig;
    use std::sync::Arc;

    fn test_db() -> (Environment, Database) {
        let env = Environment::new(EnvironmentConfig::default());
        let db = env.open_database("seq", DatabaseConfig::default()).unwrap();
        (env, db)
    }

    fn small_range(wrap: bool) -> SequenceConfig {
        SequenceConfig::new()
            .with_allow_create(true)
            .with_range(0, 99)
            .with_cache_size(10)
            .with_initial_value(0)
            .with_wrap(wrap)
    }

    #[test]
    fn test_record_codec_round_trip() {
        let record = PersistedRecord {
            increment: true,
            wrap_allowed: false,
            overflow: true,
            range_min: -5,
            range_max: i64::MAX,
            stored_value: 42,
        };
        let encoded = record.encode();
        assert_eq!(encoded.len(), RECORD_LEN);
        assert!(encoded.len() <= MAX_DATA_SIZE);
        assert_eq!(encoded[0], CURRENT_VERSION);
        assert_eq!(encoded[1], FLAG_INCR | FLAG_OVER);

        let decoded = PersistedRecord::decode(&encoded).unwrap();
        assert!(decoded.increment);
        assert!(!decoded.wrap_allowed);
        assert!(decoded.overflow);
        assert_eq!(decoded.range_min, -5);
        assert_eq!(decoded.range_max, i64::MAX);
        assert_eq!(decoded.stored_value, 42);
    }

    #[test]
    fn test_decode_short_record_fails() {
        assert!(matches!(
            PersistedRecord::decode(&[0, 1, 2]),
            Err(SequenceError::Corrupt(_))
        ));
    }

    #[test]
    fn test_open_validation() {
        let (_env, db) = test_db();

        let bad_range = SequenceConfig::new().with_allow_create(true).with_range(5, 5);
        assert!(matches!(
            db.open_sequence(None, b"s", &bad_range),
            Err(SequenceError::InvalidArgument(_))
        ));

        let bad_initial = SequenceConfig::new()
            .with_allow_create(true)
            .with_range(0, 10)
            .with_initial_value(11);
        assert!(matches!(
            db.open_sequence(None, b"s", &bad_initial),
            Err(SequenceError::InvalidArgument(_))
        ));

        let bad_cache = SequenceConfig::new()
            .with_allow_create(true)
            .with_range(0, 10)
            .with_cache_size(11);
        assert!(matches!(
            db.open_sequence(None, b"s", &bad_cache),
            Err(SequenceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_open_rejects_duplicate_databases() {
        let env = Environment::new(EnvironmentConfig::default());
        let db = env
            .open_database("dups", DatabaseConfig::new().with_sorted_duplicates(true))
            .unwrap();
        assert!(matches!(
            db.open_sequence(None, b"s", &small_range(false)),
            Err(SequenceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_missing_record_without_create() {
        let (_env, db) = test_db();
        let config = SequenceConfig::new();
        assert!(matches!(
            db.open_sequence(None, b"s", &config),
            Err(SequenceError::RecordMissing)
        ));
    }

    #[test]
    fn test_exclusive_create_conflict() {
        let (_env, db) = test_db();
        db.open_sequence(None, b"s", &small_range(false)).unwrap();
        let config = small_range(false).with_exclusive_create(true);
        assert!(matches!(
            db.open_sequence(None, b"s", &config),
            Err(SequenceError::RecordExists)
        ));
    }

    #[test]
    fn test_increment_full_range_then_sticky_overflow() {
        let (_env, db) = test_db();
        let seq = db.open_sequence(None, b"s", &small_range(false)).unwrap();

        for expected in 0..=99 {
            assert_eq!(seq.get(None, 1).unwrap(), expected);
        }
        for _ in 0..3 {
            assert!(matches!(
                seq.get(None, 1),
                Err(SequenceError::Overflow { .. })
            ));
        }

        // Overflow is persisted: a fresh handle fails identically.
        let other = db.open_sequence(None, b"s", &small_range(false)).unwrap();
        assert!(matches!(
            other.get(None, 1),
            Err(SequenceError::Overflow { .. })
        ));
    }

    #[test]
    fn test_wrap_resumes_at_range_min() {
        let (_env, db) = test_db();
        let seq = db.open_sequence(None, b"s", &small_range(true)).unwrap();

        for expected in 0..=99 {
            assert_eq!(seq.get(None, 1).unwrap(), expected);
        }
        assert_eq!(seq.get(None, 1).unwrap(), 0);
        assert_eq!(seq.get(None, 1).unwrap(), 1);
        assert_eq!(seq.get(None, 1).unwrap(), 2);
    }

    #[test]
    fn test_decrement_walks_down() {
        let (_env, db) = test_db();
        let config = small_range(false).with_decrement(true).with_initial_value(99);
        let seq = db.open_sequence(None, b"s", &config).unwrap();

        for expected in (0..=99).rev() {
            assert_eq!(seq.get(None, 1).unwrap(), expected);
        }
        assert!(matches!(
            seq.get(None, 1),
            Err(SequenceError::Overflow { .. })
        ));
    }

    #[test]
    fn test_delta_validation() {
        let (_env, db) = test_db();
        let seq = db.open_sequence(None, b"s", &small_range(false)).unwrap();
        assert!(matches!(
            seq.get(None, 0),
            Err(SequenceError::InvalidArgument(_))
        ));
        assert!(matches!(
            seq.get(None, -3),
            Err(SequenceError::InvalidArgument(_))
        ));
        assert!(matches!(
            seq.get(None, 100),
            Err(SequenceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_delta_batches_are_contiguous() {
        let (_env, db) = test_db();
        let config = SequenceConfig::new()
            .with_allow_create(true)
            .with_range(0, 1000)
            .with_cache_size(5);
        let seq = db.open_sequence(None, b"s", &config).unwrap();

        assert_eq!(seq.get(None, 3).unwrap(), 0);
        // Two cached values remain; a delta of 3 forces a refill that
        // resumes from the persisted value, abandoning the remainder.
        assert_eq!(seq.get(None, 3).unwrap(), 5);
        // Larger than the cache: claimed directly.
        assert_eq!(seq.get(None, 8).unwrap(), 10);
        assert_eq!(seq.get(None, 1).unwrap(), 18);
    }

    #[test]
    fn test_full_i64_range_arithmetic() {
        let (_env, db) = test_db();
        let config = SequenceConfig::new()
            .with_allow_create(true)
            .with_cache_size(4)
            .with_initial_value(i64::MAX - 2);
        let seq = db.open_sequence(None, b"s", &config).unwrap();

        assert_eq!(seq.get(None, 1).unwrap(), i64::MAX - 2);
        assert_eq!(seq.get(None, 1).unwrap(), i64::MAX - 1);
        assert_eq!(seq.get(None, 1).unwrap(), i64::MAX);
        assert!(matches!(
            seq.get(None, 1),
            Err(SequenceError::Overflow { .. })
        ));
    }

    #[test]
    fn test_concurrent_handles_disjoint() {
        let (_env, db) = test_db();
        let config = SequenceConfig::new()
            .with_allow_create(true)
            .with_range(0, 100_000)
            .with_cache_size(7);
        db.open_sequence(None, b"s", &config).unwrap();

        let db = Arc::new(db);
        let mut threads = Vec::new();
        for _ in 0..4 {
            let db = Arc::clone(&db);
            let config = config.clone();
            threads.push(std::thread::spawn(move || {
                let seq = db.open_sequence(None, b"s", &config).unwrap();
                let mut values = Vec::new();
                for _ in 0..200 {
                    values.push(seq.get(None, 1).unwrap());
                }
                values
            }));
        }

        let mut all: Vec<i64> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total, "concurrent handles returned overlapping values");
    }

    #[test]
    fn test_stats_fast_and_slow() {
        let (_env, db) = test_db();
        let seq = db.open_sequence(None, b"s", &small_range(false)).unwrap();
        for _ in 0..12 {
            seq.get(None, 1).unwrap();
        }

        let fast = seq.stats(&StatsConfig::new()).unwrap();
        assert_eq!(fast.n_gets, 12);
        assert_eq!(fast.n_cached_gets, 10);
        assert_eq!(fast.cache_size, 10);
        assert_eq!(fast.current, 20);
        assert_eq!(fast.value, 12);
        assert_eq!(fast.last_value, 19);

        // Another handle advances the persisted value; slow mode sees it.
        let other = db.open_sequence(None, b"s", &small_range(false)).unwrap();
        other.get(None, 1).unwrap();
        let slow = seq.stats(&StatsConfig::new().with_fast(false)).unwrap();
        assert_eq!(slow.current, 30);

        // Clearing resets the counters.
        let cleared = seq
            .stats(&StatsConfig::new().with_clear(true))
            .unwrap();
        assert_eq!(cleared.n_gets, 12);
        let after = seq.stats(&StatsConfig::new()).unwrap();
        assert_eq!(after.n_gets, 0);
        assert_eq!(after.n_cached_gets, 0);
    }

    #[test]
    fn test_get_under_caller_transaction() {
        let (env, db) = test_db();
        let seq = db.open_sequence(None, b"s", &small_range(false)).unwrap();

        let txn = env
            .begin_transaction(None, crate::txn::TransactionConfig::new())
            .unwrap();
        assert_eq!(seq.get(Some(&txn), 1).unwrap(), 0);
        txn.commit().unwrap();
        assert_eq!(seq.get(None, 1).unwrap(), 1);
    }
}
