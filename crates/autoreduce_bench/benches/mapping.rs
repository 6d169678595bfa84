//! Map, replace and delete throughput benchmarks.

use autoreduce_bench::{generate_orders, orders_definition};
use autoreduce_core::{
    AutoMapReduceIndex, IndexConfig, IndexItem, InMemoryResultStore, Tombstone,
};
use autoreduce_storage::Environment;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

fn fresh_index(config: IndexConfig) -> AutoMapReduceIndex {
    AutoMapReduceIndex::create_new(Arc::new(Environment::in_memory()), orders_definition(), config)
        .unwrap()
}

/// Benchmark mapping new documents in batches of varying size.
fn bench_map_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_batch");

    for size in [1usize, 64, 1024] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    (
                        fresh_index(IndexConfig::default().sync_on_commit(false)),
                        generate_orders(size, 0, 4),
                    )
                },
                |(index, items)| {
                    let mut results = InMemoryResultStore::new();
                    index.execute_batch(items, &mut results).unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark replacing documents that are already indexed.
fn bench_replace(c: &mut Criterion) {
    let index = fresh_index(IndexConfig::default().sync_on_commit(false));
    let mut results = InMemoryResultStore::new();
    index.execute_batch(generate_orders(1024, 0, 4), &mut results).unwrap();

    c.bench_function("replace_64", |b| {
        b.iter_batched(
            || generate_orders(64, 0, 4),
            |items| index.execute_batch(items, &mut results).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark deleting documents, with and without the reduce step.
fn bench_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_64");

    for reduce in [true, false] {
        let config = IndexConfig::default()
            .sync_on_commit(false)
            .reduce_after_batch(reduce);
        group.bench_with_input(BenchmarkId::new("reduce", reduce), &config, |b, config| {
            b.iter_batched(
                || {
                    let index = fresh_index(config.clone());
                    let mut results = InMemoryResultStore::new();
                    index.execute_batch(generate_orders(64, 0, 4), &mut results).unwrap();
                    index
                },
                |index| {
                    let mut results = InMemoryResultStore::new();
                    let tombstones = (0..64)
                        .map(|i| IndexItem::Delete(Tombstone::new(format!("orders/{i}"))));
                    index.execute_batch(tombstones, &mut results).unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark a full reduce over many groups.
fn bench_reduce_all(c: &mut Criterion) {
    let index = fresh_index(
        IndexConfig::default()
            .sync_on_commit(false)
            .reduce_after_batch(false),
    );
    let mut results = InMemoryResultStore::new();
    index.execute_batch(generate_orders(4096, 0, 2), &mut results).unwrap();

    c.bench_function("reduce_all_4096", |b| {
        b.iter(|| {
            let mut results = InMemoryResultStore::new();
            index.reduce_all(&mut results).unwrap()
        });
    });
}

criterion_group!(benches, bench_map_batch, bench_replace, bench_delete, bench_reduce_all);
criterion_main!(benches);
