// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for transaction operations.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use baritedb::env::{Environment, EnvironmentConfig};
use baritedb::store::{Database, DatabaseConfig};
use baritedb::txn::TransactionConfig;

fn create_test_env() -> (Environment, Database) {
    let env = Environment::new(EnvironmentConfig::default());
    let db = env.open_database("bench", DatabaseConfig::default()).unwrap();
    (env, db)
}

fn bench_begin_commit(c: &mut Criterion) {
    let (env, _db) = create_test_env();

    c.bench_function("txn::begin_commit_empty", |b| {
        b.iter(|| {
            let txn = env
                .begin_transaction(None, TransactionConfig::new())
                .unwrap();
            txn.commit().unwrap();
        })
    });
}

fn bench_put_commit(c: &mut Criterion) {
    let (env, db) = create_test_env();
    let counter = std::sync::atomic::AtomicU64::new(0);

    let mut group = c.benchmark_group("txn");
    group.throughput(Throughput::Elements(1));
    group.bench_function("put_commit", |b| {
        b.iter_batched(
            || {
                let i = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let txn = env
                    .begin_transaction(None, TransactionConfig::new())
                    .unwrap();
                (txn, format!("key{}", i).into_bytes())
            },
            |(txn, key)| {
                db.put(Some(&txn), &key, &[0u8; 100]).unwrap();
                txn.commit().unwrap();
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_abort(c: &mut Criterion) {
    let (env, db) = create_test_env();
    let counter = std::sync::atomic::AtomicU64::new(0);

    c.bench_function("txn::put_abort", |b| {
        b.iter_batched(
            || {
                let i = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let txn = env
                    .begin_transaction(None, TransactionConfig::new())
                    .unwrap();
                db.put(Some(&txn), format!("key{}", i).as_bytes(), b"value")
                    .unwrap();
                txn
            },
            |txn| {
                txn.abort().unwrap();
                black_box(txn)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_begin_commit, bench_put_commit, bench_abort);
criterion_main!(benches);
