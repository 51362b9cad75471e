//! Criterion micro-benchmarks for arena allocation, rewind, growth and snapshot.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use strata_arena::Arena;
use strata_bench::{mixed_profile, small_objects};
use strata_snapshot::{read_snapshot, write_snapshot};
use strata_test_utils::filled_arena;

/// Benchmark: 10K small allocations into a pre-sized arena, then reset.
fn bench_alloc_small_10k(c: &mut Criterion) {
    let workload = small_objects(10_000, 42);
    let arena = Arena::new(workload.capacity_hint(), false).unwrap();
    c.bench_function("alloc_small_10k", |b| {
        b.iter(|| {
            black_box(workload.replay(&arena).unwrap());
            arena.reset().unwrap();
        });
    });
}

/// Benchmark: mixed sizes and alignments.
fn bench_alloc_mixed_1k(c: &mut Criterion) {
    let workload = mixed_profile(1_000, 42);
    let arena = Arena::new(workload.capacity_hint(), false).unwrap();
    c.bench_function("alloc_mixed_1k", |b| {
        b.iter(|| {
            black_box(workload.replay(&arena).unwrap());
            arena.reset().unwrap();
        });
    });
}

/// Benchmark: start at 64 bytes and grow through the workload.
fn bench_alloc_growing(c: &mut Criterion) {
    let workload = small_objects(10_000, 7);
    c.bench_function("alloc_growing_10k", |b| {
        b.iter_batched(
            || Arena::new(64, true).unwrap(),
            |arena| black_box(workload.replay(&arena).unwrap()),
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: mark, allocate 16 blocks, pop.
fn bench_mark_pop(c: &mut Criterion) {
    let arena = Arena::new(64 * 1024, false).unwrap();
    c.bench_function("mark_alloc16_pop", |b| {
        b.iter(|| {
            let marker = arena.mark();
            for _ in 0..16 {
                black_box(arena.alloc(48).unwrap());
            }
            arena.pop(marker).unwrap();
        });
    });
}

/// Benchmark: in-place growth of the last block.
fn bench_realloc_last(c: &mut Criterion) {
    let arena = Arena::new(64 * 1024, false).unwrap();
    c.bench_function("realloc_last_in_place", |b| {
        b.iter(|| {
            let mut block = arena.alloc(16).unwrap();
            for step in 1..32 {
                block = arena.realloc_last(block, 16 + step * 64).unwrap();
            }
            black_box(block);
            arena.reset().unwrap();
        });
    });
}

/// Benchmark: snapshot write + restore of 64 KiB of live bytes.
fn bench_snapshot_64k(c: &mut Criterion) {
    let (source, _) = filled_arena(64 * 1024, 64 * 1024);
    let target = Arena::new(64 * 1024, false).unwrap();
    let mut buf = Vec::with_capacity(80 * 1024);
    c.bench_function("snapshot_round_trip_64k", |b| {
        b.iter(|| {
            buf.clear();
            write_snapshot(&mut buf, &source).unwrap();
            black_box(read_snapshot(&mut buf.as_slice(), &target).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_alloc_small_10k,
    bench_alloc_mixed_1k,
    bench_alloc_growing,
    bench_mark_pop,
    bench_realloc_last,
    bench_snapshot_64k
);
criterion_main!(benches);
