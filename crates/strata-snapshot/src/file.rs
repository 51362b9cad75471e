//! Snapshot files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use strata_arena::Arena;
use tracing::debug;

use crate::codec::{read_snapshot, write_snapshot, SnapshotHeader};
use crate::error::SnapshotError;

/// Write a snapshot of `arena` to `path`, replacing any existing file.
pub fn save_to_file(path: impl AsRef<Path>, arena: &Arena) -> Result<SnapshotHeader, SnapshotError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    let header = write_snapshot(&mut writer, arena)?;
    writer.flush()?;
    debug!(path = %path.display(), used_bytes = header.used_bytes, "snapshot saved");
    Ok(header)
}

/// Restore the snapshot stored at `path` into `arena`.
pub fn load_from_file(path: impl AsRef<Path>, arena: &Arena) -> Result<SnapshotHeader, SnapshotError> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let header = read_snapshot(&mut reader, arena)?;
    debug!(path = %path.display(), used_bytes = header.used_bytes, "snapshot loaded");
    Ok(header)
}
