//! Snapshot save/load through the filesystem and in-memory streams.

use strata_arena::{Arena, ArenaError, ErrorKind};
use strata_snapshot::{
    decode_snapshot, load_from_file, read_snapshot, save_to_file, write_snapshot, SnapshotError,
    HEADER_LEN,
};
use strata_test_utils::fixtures::pattern;
use strata_test_utils::{filled_arena, init_tracing, leaked_buffer, ErrorLog};

#[test]
fn file_round_trip_restores_bytes() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arena.snap");

    let (source, block) = filled_arena(256, 200);
    let saved = save_to_file(&path, &source).unwrap();
    assert_eq!(saved.used_bytes, 200);
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        (HEADER_LEN + 200) as u64
    );

    let target = Arena::new(64, true).unwrap();
    let loaded = load_from_file(&path, &target).unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(target.used(), 200);
    assert!(target.capacity() >= 200);

    let restored = source.read(block).unwrap();
    let copy = target.with_used_bytes(<[u8]>::to_vec).unwrap();
    assert_eq!(copy, restored);
    assert_eq!(copy, pattern(200));
}

#[test]
fn restore_replaces_existing_contents() {
    let (source, _) = filled_arena(128, 48);
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &source).unwrap();

    let target = Arena::new(256, false).unwrap();
    target.alloc(160).unwrap();
    target.push_marker().unwrap();
    read_snapshot(&mut buf.as_slice(), &target).unwrap();

    assert_eq!(target.used(), 48);
    assert_eq!(target.marker_depth(), 0);
    assert_eq!(target.stats().live_allocations, 0);
    assert!(target.check_integrity().is_ok());

    // Allocation continues after the restored region.
    let next = target.alloc(8).unwrap();
    assert!(next.offset() >= 48);
}

#[test]
fn fixed_arena_too_small_is_reported() {
    let (source, _) = filled_arena(256, 200);
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &source).unwrap();

    let target = Arena::new(64, false).unwrap();
    let log = ErrorLog::new();
    log.install(&target);
    let err = read_snapshot(&mut buf.as_slice(), &target).unwrap_err();
    assert!(matches!(
        err,
        SnapshotError::Arena(ArenaError::OutOfMemory { required: 200, .. })
    ));
    assert_eq!(log.kinds(), vec![ErrorKind::Exhausted]);
    assert_eq!(target.used(), 0);
}

#[test]
fn borrowed_arena_accepts_snapshot_that_fits() {
    let (source, _) = filled_arena(64, 40);
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &source).unwrap();

    let target = Arena::with_buffer(Some(leaked_buffer(64)), 64, false).unwrap();
    read_snapshot(&mut buf.as_slice(), &target).unwrap();
    assert_eq!(target.with_used_bytes(<[u8]>::to_vec).unwrap(), pattern(40));
}

#[test]
fn destroyed_arena_cannot_be_snapshotted() {
    let (source, _) = filled_arena(64, 16);
    source.destroy();
    let mut buf = Vec::new();
    assert!(matches!(
        write_snapshot(&mut buf, &source),
        Err(SnapshotError::Arena(ArenaError::Destroyed))
    ));
    assert!(buf.is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let target = Arena::new(64, true).unwrap();
    assert!(matches!(
        load_from_file(dir.path().join("absent.snap"), &target),
        Err(SnapshotError::Io(_))
    ));
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.snap");
    let (source, _) = filled_arena(128, 100);
    save_to_file(&path, &source).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..HEADER_LEN + 10]).unwrap();

    let target = Arena::new(128, true).unwrap();
    assert!(matches!(
        load_from_file(&path, &target),
        Err(SnapshotError::Truncated { expected: 100 })
    ));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn stream_round_trip(sizes in prop::collection::vec(1usize..64, 0..16)) {
            let source = Arena::new(64, true).unwrap();
            for (i, size) in sizes.iter().enumerate() {
                let block = source.alloc_aligned(*size, 1).unwrap();
                source.fill(block, i as u8).unwrap();
            }
            let mut buf = Vec::new();
            let header = write_snapshot(&mut buf, &source).unwrap();
            prop_assert_eq!(header.used_bytes as usize, source.used());

            let (decoded, payload) = decode_snapshot(&mut buf.as_slice()).unwrap();
            prop_assert_eq!(decoded, header);
            prop_assert_eq!(payload, source.with_used_bytes(<[u8]>::to_vec).unwrap());
        }
    }
}
