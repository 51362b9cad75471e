//! Region-based (arena) allocation for phase-structured workloads.
//!
//! An [`Arena`] manages one contiguous byte buffer and a cursor. Each
//! allocation bumps the cursor past an aligned block; individual blocks
//! are never freed. Space is reclaimed in bulk by [`Arena::reset`], by
//! popping back to a saved [`Marker`], or by destroying the arena.
//!
//! # Architecture
//!
//! ```text
//! Arena (cloneable handle, Arc<shared>)
//! ├── Mutex<ArenaState>
//! │   ├── Backing: Owned(RawBuffer) | Borrowed(&'static mut [u8]) | Carved{parent, base, len}
//! │   ├── cursor, marker stack (≤ 16), growth policy
//! │   └── ArenaStats
//! ├── atomics: is_destroying latch, can_grow, owns_buffer
//! ├── DebugInfo (id, label, error callback, sub-arena counter)
//! └── HookSlot (allocation observer)
//!
//! ScratchPool ── 64 × (Arena, AtomicBool in_use)
//! thread_scratch() ── one Arena per thread, reset on every retrieval
//! MarkerStack ── linked frames allocated from the arena itself
//! ```
//!
//! # Handles, not pointers
//!
//! Allocations return [`Block`] handles (arena id, offset, length) that are
//! resolved against the arena's *current* buffer, so a grow that moves the
//! buffer never leaves a dangling reference. Bytes are reached through
//! [`Arena::with_slice`], [`Arena::with_slice_mut`], [`Arena::write`] and
//! [`Arena::read`].
//!
//! # Unsafe code
//!
//! `unsafe` is confined to the private `raw` module, which owns the aligned
//! heap buffer behind every growable arena.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
mod backing;
pub mod config;
pub mod debug;
pub mod error;
pub mod growth;
pub mod hooks;
pub mod marker_stack;
pub mod math;
mod raw;
mod realloc;
pub mod scratch;
pub mod stats;
mod sub;
pub mod thread_scratch;

// Public re-exports for the primary API surface.
pub use arena::{Arena, ArenaScope, Block, Marker};
pub use config::ArenaConfig;
pub use debug::{ArenaId, ErrorCallback, ErrorReport};
pub use error::{ArenaError, ErrorKind};
pub use growth::{DoublingGrowth, GrowthPolicy};
pub use hooks::{AllocEvent, AllocationHook};
pub use marker_stack::MarkerStack;
pub use scratch::{ScratchLease, ScratchPool, ScratchPoolConfig};
pub use stats::ArenaStats;
pub use thread_scratch::{
    destroy_thread_scratch, set_thread_scratch_size, thread_scratch, with_thread_scratch,
};
