//! Reusable arena fixtures.
//!
//! - [`filled_arena`]: an arena holding a known byte pattern.
//! - [`leaked_buffer`]: a `'static` caller buffer for borrowed arenas.
//! - [`pattern`]: the deterministic pattern used by the fixtures.

use strata_arena::{Arena, Block};

/// Deterministic test bytes: `i * 31 + 7` truncated to `u8`.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31).wrapping_add(7)) as u8).collect()
}

/// A growable arena of `capacity` bytes whose first `used` bytes hold
/// [`pattern`]. Returns the arena and the block covering those bytes.
///
/// # Panics
///
/// Panics if `used` is zero or the arena cannot be created.
pub fn filled_arena(capacity: usize, used: usize) -> (Arena, Block) {
    let arena = Arena::new(capacity, true).expect("fixture arena");
    let block = arena
        .alloc_copy(&pattern(used))
        .expect("fixture allocation");
    (arena, block)
}

/// A zeroed buffer of `len` bytes that lives for the rest of the process.
pub fn leaked_buffer(len: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; len].into_boxed_slice())
}
