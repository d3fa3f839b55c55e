//! Performance benchmarks for the key tree.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keyspace_tree::{KeyTree, NodeKind};

fn synthetic_keys(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("app:{}:user:{}:field{}", i % 16, i / 8, i % 8))
        .collect()
}

/// Benchmark full-scan loads of varying size
fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_load");

    for count in [1_000, 10_000, 100_000] {
        let keys = synthetic_keys(count);
        group.bench_with_input(BenchmarkId::new("keys", count), &keys, |b, keys| {
            b.iter(|| {
                let mut tree = KeyTree::default();
                tree.bulk_load(black_box(keys));
                black_box(tree.key_count())
            });
        });
    }

    group.finish();
}

/// Benchmark single inserts into a populated tree
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_key");

    for count in [1_000, 100_000] {
        let mut tree = KeyTree::default();
        tree.bulk_load(synthetic_keys(count));

        group.bench_function(BenchmarkId::new("tree_size", count), |b| {
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                let key = format!("app:{}:new:{}", i % 16, i);
                tree.insert_key(black_box(&key));
                tree.delete_key(&key);
            });
        });
    }

    group.finish();
}

/// Benchmark delete with ancestor pruning
fn bench_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_key");

    for count in [1_000, 100_000] {
        let keys = synthetic_keys(count);
        let mut tree = KeyTree::default();
        tree.bulk_load(&keys);

        group.bench_function(BenchmarkId::new("tree_size", count), |b| {
            let mut i = 0usize;
            b.iter(|| {
                let key = &keys[i % keys.len()];
                i += 1;
                tree.delete_key(black_box(key));
                tree.insert_key(key);
            });
        });
    }

    group.finish();
}

/// Benchmark path lookups
fn bench_lookup(c: &mut Criterion) {
    let keys = synthetic_keys(100_000);
    let mut tree = KeyTree::default();
    tree.bulk_load(&keys);

    c.bench_function("lookup_leaf", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            black_box(tree.lookup(&keys[i % keys.len()], NodeKind::Leaf))
        });
    });
}

criterion_group!(benches, bench_bulk_load, bench_insert, bench_delete, bench_lookup);
criterion_main!(benches);
