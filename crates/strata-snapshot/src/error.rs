//! Error types for snapshot I/O.

use std::fmt;
use std::io;

use strata_arena::ArenaError;

/// Errors that can occur while writing or restoring a snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The stream does not start with the expected `b"STRATASNAP"` magic.
    InvalidMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the stream.
        found: u8,
    },
    /// The stream ended before the header or payload was complete.
    Truncated {
        /// Bytes the header promised.
        expected: u64,
    },
    /// The payload is larger than any arena may hold.
    TooLarge {
        /// `used_bytes` from the header.
        used_bytes: u64,
    },
    /// The arena refused the operation.
    Arena(ArenaError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"STRATASNAP\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported snapshot version {found}")
            }
            Self::Truncated { expected } => {
                write!(f, "snapshot truncated: expected {expected} payload bytes")
            }
            Self::TooLarge { used_bytes } => {
                write!(f, "snapshot of {used_bytes} bytes exceeds the arena size limit")
            }
            Self::Arena(e) => write!(f, "arena error: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ArenaError> for SnapshotError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}
