//! End-to-end scenarios through the facade crate.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use strata::prelude::*;
use strata::snapshot::{read_snapshot, write_snapshot};
use strata_test_utils::{init_tracing, ErrorLog, RecordingHook};

#[test]
fn fixed_arena_fills_then_refuses() {
    init_tracing();
    let arena = Arena::new(128, false).unwrap();
    let log = ErrorLog::new();
    log.install(&arena);

    arena.alloc(64).unwrap();
    arena.alloc(64).unwrap();
    let err = arena.alloc(1).unwrap_err();

    assert!(matches!(err, ArenaError::OutOfMemory { .. }));
    assert_eq!(log.len(), 1);
    assert_eq!(arena.used(), 128);
    assert_eq!(arena.remaining(), 0);
    assert_eq!(arena.stats().failed_allocations, 1);
}

#[test]
fn growable_arena_doubles_once() {
    let arena = Arena::new(64, true).unwrap();
    arena.alloc(100).unwrap();
    assert!(arena.capacity() >= 128);
    assert_eq!(arena.stats().growth_history, vec![64]);
    assert_eq!(arena.used() + arena.remaining(), arena.capacity());
}

#[test]
fn pop_rewinds_to_marker() {
    let arena = Arena::new(256, false).unwrap();
    arena.alloc(10).unwrap();
    let marker = arena.mark();
    arena.alloc(50).unwrap();
    arena.alloc(20).unwrap();
    arena.pop(marker).unwrap();
    assert_eq!(marker.offset(), 10);
    assert_eq!(arena.used(), marker.offset());

    // The next default-aligned block starts on the alignment boundary.
    let next = arena.alloc(1).unwrap();
    assert_eq!(next.offset(), 16);
}

#[test]
fn realloc_of_last_block_stays_put() {
    let arena = Arena::new(1024, true).unwrap();
    let p = arena.alloc(64).unwrap();
    arena.fill(p, 0xAB).unwrap();
    let q = arena.realloc_last(p, 256).unwrap();
    assert_eq!(q.offset(), p.offset());
    assert!(arena.read(q).unwrap()[..64].iter().all(|&b| b == 0xAB));
}

#[test]
fn realloc_of_older_block_moves() {
    let arena = Arena::new(512, false).unwrap();
    let a = arena.alloc(64).unwrap();
    arena.fill(a, 0x5A).unwrap();
    arena.alloc(64).unwrap();
    let c = arena.realloc_last(a, 128).unwrap();
    assert_ne!(c.offset(), a.offset());
    assert!(arena.read(c).unwrap()[..64].iter().all(|&b| b == 0x5A));
    assert!(arena.used() >= 256);
}

#[test]
fn scratch_pool_exhausts_and_recycles() {
    let pool = ScratchPool::new(1024).unwrap();
    let held: Vec<Arena> = (0..64).map(|_| pool.acquire().unwrap()).collect();
    let ids: HashSet<_> = held.iter().map(Arena::id).collect();
    assert_eq!(ids.len(), 64);

    assert!(matches!(
        pool.acquire(),
        Err(ArenaError::PoolExhausted { slots: 64 })
    ));

    held[5].alloc(300).unwrap();
    assert!(pool.release(&held[5]));
    let again = pool.acquire().unwrap();
    assert!(again.ptr_eq(&held[5]));
    assert_eq!(again.used(), 0);
}

#[test]
fn sub_arena_lives_inside_parent() {
    let parent = Arena::new(1024, false).unwrap();
    parent.set_debug_label("frame");
    let child = parent.alloc_sub(256).unwrap();
    assert!(child.is_sub_arena());
    assert_eq!(parent.used(), 256);

    let block = child.alloc_copy(b"nested").unwrap();
    assert_eq!(child.read(block).unwrap(), b"nested");
    assert!(child.parent().unwrap().ptr_eq(&parent));
    assert!(child.name().starts_with(parent.name()));
}

#[test]
fn hook_sees_every_allocation_kind() {
    let arena = Arena::new(1024, false).unwrap();
    let hook = RecordingHook::new();
    hook.install(&arena);

    let a = arena.alloc_labeled(32, "mesh").unwrap();
    arena.calloc_labeled(4, 8, "zeros").unwrap();
    arena.realloc_last(a, 48).unwrap();

    let records = hook.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].label, "mesh");
    assert_eq!(records[1].label, "zeros");
    assert_eq!(records[1].size, 32);
    assert!(records.iter().all(|r| r.arena_name == arena.name()));
    assert_eq!(arena.stats().allocations, 3);
}

#[test]
fn scope_and_marker_stack_compose() {
    let arena = Arena::new(4096, false).unwrap();
    let mut stack = MarkerStack::new(&arena);
    arena.alloc(100).unwrap();
    stack.push().unwrap();
    {
        let scope = arena.scope();
        scope.alloc(500).unwrap();
    }
    arena.alloc(64).unwrap();
    let marker = stack.pop().unwrap();
    assert_eq!(arena.used(), marker.offset());
    assert!(stack.is_empty());
}

#[test]
fn snapshot_round_trip_through_facade() {
    let source = Arena::new(256, false).unwrap();
    source.alloc_copy(b"persisted bytes").unwrap();
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &source).unwrap();

    let target = Arena::new(64, true).unwrap();
    let header = read_snapshot(&mut buf.as_slice(), &target).unwrap();
    assert_eq!(header.used_bytes as usize, source.used());
    assert_eq!(
        target.with_used_bytes(<[u8]>::to_vec).unwrap(),
        source.with_used_bytes(<[u8]>::to_vec).unwrap()
    );
}

#[test]
fn concurrent_allocations_are_disjoint_and_counted() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 200;

    let arena = Arena::new(THREADS * PER_THREAD * 32, false).unwrap();
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let arena = arena.clone();
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|_| arena.alloc(24).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut blocks: Vec<Block> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    blocks.sort_by_key(Block::offset);
    for pair in blocks.windows(2) {
        assert!(pair[0].end() <= pair[1].offset());
    }
    assert_eq!(arena.stats().allocations, (THREADS * PER_THREAD) as u64);
}

#[test]
fn pool_slots_are_never_shared_between_threads() {
    let pool = Arc::new(ScratchPool::new(1024).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..100 {
                    let lease = pool.lease().unwrap();
                    let block = lease.alloc(64).unwrap();
                    lease.fill(block, t as u8).unwrap();
                    thread::yield_now();
                    assert!(lease.read(block).unwrap().iter().all(|&b| b == t as u8));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn thread_scratch_is_per_thread() {
    let here = thread_scratch().unwrap();
    assert!(here.ptr_eq(&thread_scratch().unwrap()));

    let there = thread::spawn(|| thread_scratch().unwrap().id())
        .join()
        .unwrap();
    assert_ne!(here.id(), there);
}

#[test]
fn thread_scratch_size_is_set_through_prelude() {
    let capacity = thread::spawn(|| {
        assert!(set_thread_scratch_size(2048));
        let scratch = thread_scratch().unwrap();
        assert!(!set_thread_scratch_size(64));
        let capacity = scratch.capacity();
        destroy_thread_scratch();
        capacity
    })
    .join()
    .unwrap();
    assert_eq!(capacity, 2048);
}
