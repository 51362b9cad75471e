//! Encode/decode of the snapshot stream.

use std::io::{self, Read, Write};

use strata_arena::config::MAX_CAPACITY;
use strata_arena::Arena;
use tracing::debug;

use crate::error::SnapshotError;
use crate::{FORMAT_VERSION, MAGIC};

/// The fixed header in front of every snapshot payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Format version.
    pub version: u8,
    /// Length of the payload that follows.
    pub used_bytes: u64,
}

/// Write the used region of `arena` to `w`.
///
/// The arena lock is held while the payload is written, so the snapshot is
/// consistent with concurrent allocators.
pub fn write_snapshot(w: &mut dyn Write, arena: &Arena) -> Result<SnapshotHeader, SnapshotError> {
    let header = arena.with_used_bytes(|bytes| -> Result<SnapshotHeader, SnapshotError> {
        let header = SnapshotHeader {
            version: FORMAT_VERSION,
            used_bytes: bytes.len() as u64,
        };
        encode_header(w, &header)?;
        w.write_all(bytes)?;
        Ok(header)
    })??;
    debug!(arena = %arena.name(), used_bytes = header.used_bytes, "snapshot written");
    Ok(header)
}

/// Read and validate the header.
pub fn read_header(r: &mut dyn Read) -> Result<SnapshotHeader, SnapshotError> {
    let mut magic = [0u8; MAGIC.len()];
    read_exact(r, &mut magic, 0)?;
    if magic != MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }
    let mut version = [0u8; 1];
    read_exact(r, &mut version, 0)?;
    if version[0] != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion { found: version[0] });
    }
    let mut len = [0u8; 8];
    read_exact(r, &mut len, 0)?;
    Ok(SnapshotHeader {
        version: version[0],
        used_bytes: u64::from_ne_bytes(len),
    })
}

/// Read a full snapshot into memory without touching any arena.
pub fn decode_snapshot(r: &mut dyn Read) -> Result<(SnapshotHeader, Vec<u8>), SnapshotError> {
    let header = read_header(r)?;
    let len = usize::try_from(header.used_bytes)
        .ok()
        .filter(|len| *len <= MAX_CAPACITY)
        .ok_or(SnapshotError::TooLarge {
            used_bytes: header.used_bytes,
        })?;
    let mut payload = vec![0u8; len];
    read_exact(r, &mut payload, header.used_bytes)?;
    Ok((header, payload))
}

/// Read a snapshot from `r` and restore it into `arena`.
///
/// The arena is reset first and grows if it may; a fixed arena that is too
/// small reports [`SnapshotError::Arena`].
pub fn read_snapshot(r: &mut dyn Read, arena: &Arena) -> Result<SnapshotHeader, SnapshotError> {
    let (header, payload) = decode_snapshot(r)?;
    arena.restore(&payload)?;
    debug!(arena = %arena.name(), used_bytes = header.used_bytes, "snapshot restored");
    Ok(header)
}

fn encode_header(w: &mut dyn Write, header: &SnapshotHeader) -> Result<(), SnapshotError> {
    w.write_all(&MAGIC)?;
    w.write_all(&[header.version])?;
    w.write_all(&header.used_bytes.to_ne_bytes())?;
    Ok(())
}

/// `read_exact`, mapping a short read to [`SnapshotError::Truncated`].
fn read_exact(r: &mut dyn Read, buf: &mut [u8], expected: u64) -> Result<(), SnapshotError> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => SnapshotError::Truncated { expected },
        _ => SnapshotError::Io(e),
    })
}
