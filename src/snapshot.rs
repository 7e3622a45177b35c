//! Locating snapshot files on disk
//!
//! Scrapers write one JSON file per run, named `<anything>_YYYYMMDD_HHMMSS.json`.
//! Files that do not follow the pattern are ordered by modification time.

use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::*;

/// Extension of snapshot files
pub const SNAPSHOT_EXTENSION: &str = "json";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;

/// Parse the capture time embedded in a snapshot file name
pub fn timestamp_from_file_name(file_name: &str) -> Option<NaiveDateTime> {
    let stem = file_name.strip_suffix(".json")?;
    let split = stem.len().checked_sub(TIMESTAMP_LEN)?;
    if !stem.is_char_boundary(split) {
        return None;
    }

    let (head, stamp) = stem.split_at(split);
    if !head.ends_with('_') {
        return None;
    }

    let well_formed = stamp.bytes().enumerate().all(|(i, b)| match i {
        8 => b == b'_',
        _ => b.is_ascii_digit(),
    });
    if !well_formed {
        return None;
    }

    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Capture time of a snapshot: from its name, else its modification time
pub fn snapshot_timestamp(path: &Path) -> FeederResult<NaiveDateTime> {
    if let Some(stamp) = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(timestamp_from_file_name)
    {
        return Ok(stamp);
    }

    let io_error = |source| FeederError::Io {
        path: path.to_path_buf(),
        source,
    };
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(io_error)?;
    Ok(DateTime::<Local>::from(modified).naive_local())
}

/// Up to `n` snapshot files in `dir`, newest first.
///
/// A missing directory has no snapshots.
pub fn latest_snapshots(dir: &Path, n: usize) -> FeederResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "snapshot directory does not exist");
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|source| FeederError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut snapshots = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| FeederError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let is_snapshot =
            path.is_file() && path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION);
        if is_snapshot {
            let stamp = snapshot_timestamp(&path)?;
            snapshots.push((stamp, path));
        }
    }

    snapshots.sort_by(|a, b| b.cmp(a));
    snapshots.truncate(n);

    debug!(
        dir = %dir.display(),
        found = snapshots.len(),
        "selected latest snapshots"
    );

    Ok(snapshots.into_iter().map(|(_, path)| path).collect())
}
