//! One scratch arena per thread, reset on every retrieval.
//!
//! The arena is created lazily on the first [`thread_scratch`] call with
//! the size configured for the calling thread (default
//! [`THREAD_SCRATCH_DEFAULT_SIZE`], growable) and dropped with the
//! thread-local storage when the thread exits.

use std::cell::RefCell;

use tracing::debug;

use crate::arena::Arena;
use crate::config::THREAD_SCRATCH_DEFAULT_SIZE;
use crate::error::ArenaError;

/// Label attached to thread scratch arenas.
pub const THREAD_SCRATCH_LABEL: &str = "thread scratch";

struct ThreadScratch {
    arena: Option<Arena>,
    size: usize,
}

thread_local! {
    static SCRATCH: RefCell<ThreadScratch> = const {
        RefCell::new(ThreadScratch {
            arena: None,
            size: THREAD_SCRATCH_DEFAULT_SIZE,
        })
    };
}

/// This thread's scratch arena, reset to empty.
///
/// Every call on one thread returns a handle to the same arena, and every
/// call resets it, so blocks from an earlier call must not be used after
/// the next one. Fails with [`ArenaError::Destroyed`] during thread
/// teardown.
pub fn thread_scratch() -> Result<Arena, ArenaError> {
    SCRATCH
        .try_with(|cell| -> Result<Arena, ArenaError> {
            let mut scratch = cell.borrow_mut();
            let existing = scratch.arena.as_ref().filter(|a| a.is_valid()).cloned();
            let arena = match existing {
                Some(arena) => arena,
                None => {
                    let arena = Arena::new(scratch.size, true)?;
                    arena.set_debug_label(THREAD_SCRATCH_LABEL);
                    debug!(arena = %arena.name(), size = scratch.size, "thread scratch created");
                    scratch.arena = Some(arena.clone());
                    arena
                }
            };
            arena.reset()?;
            Ok(arena)
        })
        .unwrap_or(Err(ArenaError::Destroyed))
}

/// Run `f` with this thread's freshly reset scratch arena.
pub fn with_thread_scratch<R>(f: impl FnOnce(&Arena) -> R) -> Result<R, ArenaError> {
    let arena = thread_scratch()?;
    Ok(f(&arena))
}

/// Destroy this thread's scratch arena. The next [`thread_scratch`] call
/// creates a new one.
pub fn destroy_thread_scratch() {
    let taken = SCRATCH
        .try_with(|cell| cell.borrow_mut().arena.take())
        .ok()
        .flatten();
    if let Some(arena) = taken {
        arena.destroy();
    }
}

/// Set the initial size of this thread's scratch arena.
///
/// Only takes effect before the arena exists; returns whether it did.
pub fn set_thread_scratch_size(size: usize) -> bool {
    SCRATCH
        .try_with(|cell| {
            let mut scratch = cell.borrow_mut();
            if scratch.arena.is_some() {
                return false;
            }
            scratch.size = size;
            true
        })
        .unwrap_or(false)
}
