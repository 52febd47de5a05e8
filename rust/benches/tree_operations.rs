use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use pbtree::{BPlusTreeMap, TreeConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

const TREE_SIZE: u64 = 10_000;

fn shuffled_keys(count: u64, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys: Vec<u64> = (0..count).collect();
    for i in (1..keys.len()).rev() {
        keys.swap(i, rng.gen_range(0..=i));
    }
    keys
}

fn insertion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("insertion");
    let keys = shuffled_keys(TREE_SIZE, 1);

    for capacity in [8usize, 16, 64, 128] {
        group.bench_with_input(BenchmarkId::new("pbtree_random", capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let mut tree = BPlusTreeMap::new(capacity).unwrap();
                for &key in &keys {
                    tree.insert(key, key);
                }
                black_box(tree.len())
            })
        });
    }

    group.bench_function("btreemap_random", |b| {
        b.iter(|| {
            let mut tree = BTreeMap::new();
            for &key in &keys {
                tree.insert(key, key);
            }
            black_box(tree.len())
        })
    });

    group.bench_function("pbtree_bulk_load", |b| {
        b.iter(|| {
            let mut tree = BPlusTreeMap::new(64).unwrap();
            tree.bulk_load((0..TREE_SIZE).map(|k| (k, k))).unwrap();
            black_box(tree.len())
        })
    });
    group.finish();
}

fn lookup_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let probes = shuffled_keys(TREE_SIZE, 2);

    for (name, config) in [
        ("linear_search", TreeConfig::with_capacity(64).binary_search_threshold(usize::MAX)),
        ("binary_search", TreeConfig::with_capacity(64).binary_search_threshold(0)),
    ] {
        let mut tree = BPlusTreeMap::with_config(config).unwrap();
        tree.bulk_load((0..TREE_SIZE).map(|k| (k, k))).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                for key in &probes {
                    black_box(tree.get(key));
                }
            })
        });
    }
    group.finish();
}

fn deletion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("deletion");
    let keys = shuffled_keys(TREE_SIZE, 3);

    group.bench_function("pbtree_erase_all_random", |b| {
        b.iter_batched(
            || {
                let mut tree = BPlusTreeMap::new(16).unwrap();
                tree.bulk_load((0..TREE_SIZE).map(|k| (k, k))).unwrap();
                tree
            },
            |mut tree| {
                for key in &keys {
                    tree.erase_by_key(key);
                }
                black_box(tree.is_empty())
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn dump_restore_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dump_restore");
    let mut tree = BPlusTreeMap::new(64).unwrap();
    tree.bulk_load((0..TREE_SIZE).map(|k| (k, k * 2))).unwrap();
    let mut image = Vec::new();
    tree.dump(&mut image).unwrap();

    group.bench_function("dump", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(image.len());
            tree.dump(&mut out).unwrap();
            black_box(out.len())
        })
    });
    group.bench_function("restore", |b| {
        b.iter(|| {
            let mut copy = BPlusTreeMap::<u64, u64>::new(64).unwrap();
            copy.restore(image.as_slice()).unwrap();
            black_box(copy.len())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    insertion_benchmark,
    lookup_benchmark,
    deletion_benchmark,
    dump_restore_benchmark
);
criterion_main!(benches);
