//! Crash-safe persistence of the observation store.
//!
//! A snapshot is written to `<path>.tmp` and then renamed into place, so a
//! reader (or a crashed process restarting) never observes a half-written
//! file. Absent, empty, or corrupt files are treated as "start empty"
//! rather than a fatal error.

use crate::errors::AggregationResult;
use crate::store::Snapshot;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Write `snapshot` to `path` atomically: write the temp file, `fsync` it
/// so the bytes are durable before the file is visible under its final
/// name, then rename into place. Skipping the `fsync` would let the
/// rename land durably while the data it points at is still only in the
/// page cache, so a crash right after could resurrect a stale or empty
/// snapshot despite the response already having promised durability.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> AggregationResult<()> {
    let tmp_path = tmp_path_for(path);
    let bytes = serde_json::to_vec_pretty(snapshot)?;

    let mut file = File::create(&tmp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)?;
    debug!(stations = snapshot.len(), "flushed snapshot to {}", path.display());
    Ok(())
}

/// Load a snapshot from `path`. A missing file, an empty file, or a file
/// that fails to parse all result in `Ok(None)` ("start empty") rather
/// than propagating an error — a corrupt snapshot should not prevent the
/// server from starting.
pub fn load_snapshot(path: &Path) -> AggregationResult<Option<Snapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if bytes.is_empty() {
        return Ok(None);
    }

    match serde_json::from_slice::<Snapshot>(&bytes) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            warn!("snapshot at {} is corrupt, starting empty: {e}", path.display());
            Ok(None)
        }
    }
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::path::PathBuf::from(tmp)
}
