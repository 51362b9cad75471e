//! Binary snapshots of the live bytes of an arena.
//!
//! A snapshot captures `[0, used)` of an arena buffer so it can be written
//! to disk and later restored into another (or the same) arena.
//!
//! # Format
//!
//! ```text
//! [MAGIC "STRATASNAP"] [VERSION u8] [used_bytes u64] [bytes ...]
//! ```
//!
//! `used_bytes` is native-endian and the payload is a raw memory image,
//! so snapshots are only portable between machines of the same byte
//! order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod file;

pub use codec::{decode_snapshot, read_header, read_snapshot, write_snapshot, SnapshotHeader};
pub use error::SnapshotError;
pub use file::{load_from_file, save_to_file};

/// Magic bytes at the start of every snapshot.
pub const MAGIC: [u8; 10] = *b"STRATASNAP";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the fixed header: magic, version and `used_bytes`.
pub const HEADER_LEN: usize = MAGIC.len() + 1 + 8;
