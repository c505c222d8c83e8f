//! Throughput benchmarks.
//!
//! Compares each container against its std counterpart.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nexus_containers::{Deque, OrderedMap, PriorityQueue, UnorderedMap, Vector};
use std::collections::{BTreeMap, BinaryHeap, HashMap, VecDeque};

const SIZES: [usize; 3] = [100, 10_000, 1_000_000];

/// Scrambles `0..n` without pulling in an RNG.
fn keys(n: usize) -> Vec<u64> {
    (0..n as u64)
        .map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15))
        .collect()
}

// ============================================================================
// Sequences
// ============================================================================

fn bench_push_back(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_back");

    for n in SIZES {
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("nexus_vector", n), &n, |b, &n| {
            b.iter(|| {
                let mut v = Vector::new();
                for i in 0..n {
                    v.push_back(black_box(i));
                }
                v
            });
        });

        group.bench_with_input(BenchmarkId::new("std_vec", n), &n, |b, &n| {
            b.iter(|| {
                let mut v = Vec::new();
                for i in 0..n {
                    v.push(black_box(i));
                }
                v
            });
        });

        group.bench_with_input(BenchmarkId::new("nexus_deque", n), &n, |b, &n| {
            b.iter(|| {
                let mut d = Deque::new();
                for i in 0..n {
                    d.push_back(black_box(i));
                }
                d
            });
        });

        group.bench_with_input(BenchmarkId::new("std_vecdeque", n), &n, |b, &n| {
            b.iter(|| {
                let mut d = VecDeque::new();
                for i in 0..n {
                    d.push_back(black_box(i));
                }
                d
            });
        });
    }

    group.finish();
}

fn bench_deque_random_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("deque_index");
    let n = 100_000;
    let d: Deque<u64> = (0..n as u64).collect();
    let std: VecDeque<u64> = (0..n as u64).collect();
    let idx: Vec<usize> = keys(n).into_iter().map(|k| k as usize % n).collect();

    group.throughput(Throughput::Elements(n as u64));
    group.bench_function("nexus_deque", |b| {
        b.iter(|| idx.iter().map(|&i| d[i]).fold(0u64, u64::wrapping_add));
    });
    group.bench_function("std_vecdeque", |b| {
        b.iter(|| idx.iter().map(|&i| std[i]).fold(0u64, u64::wrapping_add));
    });

    group.finish();
}

// ============================================================================
// Maps
// ============================================================================

fn bench_map_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_insert");

    for n in [100, 10_000, 100_000] {
        let keys = keys(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("nexus_ordered", n), &keys, |b, keys| {
            b.iter(|| {
                let mut m = OrderedMap::new();
                for &k in keys {
                    m.insert(black_box(k), k);
                }
                m
            });
        });

        group.bench_with_input(BenchmarkId::new("std_btree", n), &keys, |b, keys| {
            b.iter(|| {
                let mut m = BTreeMap::new();
                for &k in keys {
                    m.insert(black_box(k), k);
                }
                m
            });
        });

        group.bench_with_input(BenchmarkId::new("nexus_unordered", n), &keys, |b, keys| {
            b.iter(|| {
                let mut m: UnorderedMap<u64, u64> = UnorderedMap::new();
                for &k in keys {
                    m.insert(black_box(k), k);
                }
                m
            });
        });

        group.bench_with_input(BenchmarkId::new("std_hashmap_ahash", n), &keys, |b, keys| {
            b.iter(|| {
                let mut m: HashMap<u64, u64, ahash::RandomState> = HashMap::default();
                for &k in keys {
                    m.insert(black_box(k), k);
                }
                m
            });
        });
    }

    group.finish();
}

fn bench_map_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_lookup");
    let n = 100_000;
    let keys = keys(n);

    let ordered: OrderedMap<u64, u64> = keys.iter().map(|&k| (k, k)).collect();
    let btree: BTreeMap<u64, u64> = keys.iter().map(|&k| (k, k)).collect();
    let unordered: UnorderedMap<u64, u64> = keys.iter().map(|&k| (k, k)).collect();
    let hashmap: HashMap<u64, u64, ahash::RandomState> = keys.iter().map(|&k| (k, k)).collect();

    group.throughput(Throughput::Elements(n as u64));
    group.bench_function("nexus_ordered", |b| {
        b.iter(|| keys.iter().filter(|k| ordered.get(*k).is_some()).count());
    });
    group.bench_function("std_btree", |b| {
        b.iter(|| keys.iter().filter(|k| btree.get(*k).is_some()).count());
    });
    group.bench_function("nexus_unordered", |b| {
        b.iter(|| keys.iter().filter(|k| unordered.get(*k).is_some()).count());
    });
    group.bench_function("std_hashmap_ahash", |b| {
        b.iter(|| keys.iter().filter(|k| hashmap.get(*k).is_some()).count());
    });

    group.finish();
}

// ============================================================================
// Priority queue
// ============================================================================

fn bench_priority_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("priority_queue");
    let n = 10_000;
    let keys = keys(n);

    group.throughput(Throughput::Elements(n as u64));
    group.bench_function("nexus_pq", |b| {
        b.iter(|| {
            let mut pq = PriorityQueue::new();
            for &k in &keys {
                pq.push(black_box(k));
            }
            while let Some(k) = pq.pop() {
                black_box(k);
            }
        });
    });
    group.bench_function("std_binary_heap", |b| {
        b.iter(|| {
            let mut pq = BinaryHeap::new();
            for &k in &keys {
                pq.push(black_box(k));
            }
            while let Some(k) = pq.pop() {
                black_box(k);
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_push_back,
    bench_deque_random_access,
    bench_map_insert,
    bench_map_lookup,
    bench_priority_queue,
);
criterion_main!(benches);
