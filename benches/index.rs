//! Benchmarks for vector index build and search.
//!
//! Measures snapshot construction and top-k search over logo-sized
//! (512-dimensional) vectors at several index sizes.

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use marksearch::{IndexSnapshot, TrademarkId};
use std::hint::black_box;

const DIMS: usize = 512;

/// Deterministic pseudo-random vectors (xorshift).
fn vectors(count: usize) -> Vec<(TrademarkId, Option<Vec<f32>>)> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..count)
        .map(|i| {
            let vector = (0..DIMS)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state % 2_000) as f32 / 1_000.0 - 1.0
                })
                .collect();
            (TrademarkId::new(i as i64 + 1), Some(vector))
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    group.sample_size(10);
    for size in [1_000, 10_000] {
        let rows = vectors(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| IndexSnapshot::build(DIMS, black_box(rows.clone())).unwrap());
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_search_top50");
    for size in [1_000, 10_000, 50_000] {
        let rows = vectors(size);
        let query = rows[size / 2].1.clone().unwrap();
        let snapshot = IndexSnapshot::build(DIMS, rows).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| snapshot.search(black_box(&query), 50).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_search);
criterion_main!(benches);
