//! Strata: region-based arena allocation for phase-structured workloads.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the strata sub-crates. For most users, adding `strata` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! // A 1 KiB arena that may grow.
//! let arena = Arena::new(1024, true).unwrap();
//!
//! // Allocations are handles into the arena buffer.
//! let greeting = arena.alloc_copy(b"hello").unwrap();
//! assert_eq!(arena.read(greeting).unwrap(), b"hello");
//!
//! // Temporary work is rolled back in bulk.
//! let marker = arena.mark();
//! let tmp = arena.calloc(16, 4).unwrap();
//! arena.with_slice(tmp, |bytes| assert!(bytes.iter().all(|b| *b == 0))).unwrap();
//! arena.pop(marker).unwrap();
//! assert_eq!(arena.used(), marker.offset());
//!
//! // Short-lived arenas come from a pool.
//! let pool = ScratchPool::new(1024).unwrap();
//! {
//!     let scratch = pool.lease().unwrap();
//!     scratch.alloc(512).unwrap();
//! }
//! assert_eq!(pool.in_use(), 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`arena`] | `strata-arena` | `Arena`, handles, growth, sub-arenas, scratch, stats, hooks |
//! | [`snapshot`] | `strata-snapshot` | Binary snapshots of an arena's live bytes |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// The allocator engine (`strata-arena`).
///
/// Everything except snapshots lives here; the most common types are also
/// in the [`prelude`].
pub use strata_arena as arena;

/// Snapshots of an arena's live bytes (`strata-snapshot`).
///
/// Write with [`snapshot::write_snapshot`] or [`snapshot::save_to_file`],
/// restore with [`snapshot::read_snapshot`] or [`snapshot::load_from_file`].
pub use strata_snapshot as snapshot;

/// Common imports for typical strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Arena and handles
    pub use strata_arena::{Arena, ArenaConfig, ArenaScope, Block, Marker, MarkerStack};

    // Errors
    pub use strata_arena::{ArenaError, ErrorKind};
    pub use strata_snapshot::SnapshotError;

    // Observability
    pub use strata_arena::{AllocEvent, AllocationHook, ArenaStats, ErrorCallback, ErrorReport};

    // Growth
    pub use strata_arena::{DoublingGrowth, GrowthPolicy};

    // Scratch
    pub use strata_arena::{
        destroy_thread_scratch, set_thread_scratch_size, thread_scratch, with_thread_scratch,
        ScratchLease, ScratchPool, ScratchPoolConfig,
    };
}
