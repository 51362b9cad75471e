//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use crate::debug::ArenaId;

/// Broad classification of an [`ArenaError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller passed a bad size, alignment, handle or configuration.
    InvalidArgument,
    /// The arena cannot satisfy the request and may not grow further.
    Exhausted,
    /// The arena is being destroyed, is corrupted, or the operation does
    /// not make sense in its current state.
    InvalidState,
    /// A shared resource (scratch pool slot) is unavailable.
    Resource,
}

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// A zero-byte allocation was requested.
    ZeroSize,
    /// Alignment is zero, not a power of two, or above the supported maximum.
    InvalidAlignment {
        /// The rejected alignment.
        alignment: usize,
    },
    /// `count * size` overflowed.
    SizeOverflow {
        /// Element count.
        count: usize,
        /// Element size in bytes.
        size: usize,
    },
    /// The request exceeds the global capacity limit.
    TooLarge {
        /// Number of bytes requested.
        requested: usize,
        /// The limit that was exceeded.
        limit: usize,
    },
    /// The request does not fit and the arena may not grow.
    OutOfMemory {
        /// Bytes the arena would need to hold (cursor after the request).
        required: usize,
        /// Current capacity in bytes.
        capacity: usize,
    },
    /// Growth was allowed but the policy or the host allocator refused.
    GrowthFailed {
        /// Capacity before the attempt.
        from: usize,
        /// Minimum capacity that was needed.
        required: usize,
    },
    /// The arena has been destroyed (or destruction is in progress).
    Destroyed,
    /// The parent of a sub-arena no longer exists.
    ParentGone,
    /// An integrity check failed.
    Corrupted {
        /// Which invariant was violated.
        detail: String,
    },
    /// A marker lies beyond the current cursor.
    InvalidMarker {
        /// Offset recorded in the marker.
        marker: usize,
        /// Current cursor.
        cursor: usize,
    },
    /// A marker or block handle belongs to a different arena.
    ForeignHandle {
        /// The arena the operation was invoked on.
        expected: ArenaId,
        /// The arena the handle came from.
        found: ArenaId,
    },
    /// A block handle does not lie within the live region.
    InvalidBlock {
        /// Block offset.
        offset: usize,
        /// Block length.
        len: usize,
        /// Current cursor.
        cursor: usize,
    },
    /// The block is not the most recent allocation.
    NotLastBlock {
        /// Block offset.
        offset: usize,
    },
    /// The built-in marker stack already holds the maximum number of markers.
    MarkerStackFull {
        /// Maximum depth.
        depth: usize,
    },
    /// Pop on an empty marker stack.
    MarkerStackEmpty,
    /// Every scratch slot is in use.
    PoolExhausted {
        /// Number of slots in the pool.
        slots: usize,
    },
    /// A configuration value is out of range.
    InvalidConfig {
        /// Human-readable reason.
        reason: String,
    },
}

impl ArenaError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroSize
            | Self::InvalidAlignment { .. }
            | Self::SizeOverflow { .. }
            | Self::TooLarge { .. }
            | Self::ForeignHandle { .. }
            | Self::InvalidBlock { .. }
            | Self::InvalidConfig { .. } => ErrorKind::InvalidArgument,
            Self::OutOfMemory { .. } | Self::GrowthFailed { .. } => ErrorKind::Exhausted,
            Self::Destroyed
            | Self::ParentGone
            | Self::Corrupted { .. }
            | Self::InvalidMarker { .. }
            | Self::NotLastBlock { .. }
            | Self::MarkerStackFull { .. }
            | Self::MarkerStackEmpty => ErrorKind::InvalidState,
            Self::PoolExhausted { .. } => ErrorKind::Resource,
        }
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSize => write!(f, "zero-size allocation requested"),
            Self::InvalidAlignment { alignment } => {
                write!(f, "invalid alignment {alignment}: must be a power of two")
            }
            Self::SizeOverflow { count, size } => {
                write!(f, "size overflow: {count} x {size} bytes")
            }
            Self::TooLarge { requested, limit } => {
                write!(f, "request of {requested} bytes exceeds limit of {limit} bytes")
            }
            Self::OutOfMemory { required, capacity } => {
                write!(
                    f,
                    "out of memory: need {required} bytes, capacity {capacity} bytes"
                )
            }
            Self::GrowthFailed { from, required } => {
                write!(
                    f,
                    "growth failed: could not grow from {from} to at least {required} bytes"
                )
            }
            Self::Destroyed => write!(f, "arena is destroyed"),
            Self::ParentGone => write!(f, "parent arena no longer exists"),
            Self::Corrupted { detail } => write!(f, "integrity check failed: {detail}"),
            Self::InvalidMarker { marker, cursor } => {
                write!(f, "marker {marker} is beyond the cursor {cursor}")
            }
            Self::ForeignHandle { expected, found } => {
                write!(f, "handle from arena {found} used with arena {expected}")
            }
            Self::InvalidBlock {
                offset,
                len,
                cursor,
            } => {
                write!(
                    f,
                    "block [{offset}, +{len}) is outside the live region (cursor {cursor})"
                )
            }
            Self::NotLastBlock { offset } => {
                write!(f, "block at offset {offset} is not the last allocation")
            }
            Self::MarkerStackFull { depth } => {
                write!(f, "marker stack is full ({depth} entries)")
            }
            Self::MarkerStackEmpty => write!(f, "marker stack is empty"),
            Self::PoolExhausted { slots } => {
                write!(f, "scratch pool exhausted: all {slots} slots in use")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid config: {reason}"),
        }
    }
}

impl Error for ArenaError {}
