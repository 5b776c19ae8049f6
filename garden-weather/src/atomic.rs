//! Atomic file I/O shared by the store, shadow and backup layers
//!
//! - Atomic writes (temp file in the same directory + fsync + rename)
//! - Quarantine of untrusted files
//! - Bounded cleanup of temp files left behind by crashed writers
//! - SHA-256 content checksums for backup sets

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};

use crate::error::{IoResultExt, Result, WeatherError};

/// Maximum number of files to scan during stale temp cleanup
const CLEANUP_SCAN_LIMIT: usize = 1000;

/// Age threshold for temp file cleanup (1 hour)
pub const CLEANUP_AGE_THRESHOLD: Duration = Duration::from_secs(3600);

/// Marker that identifies temp files produced by [`write_atomic`]
const TEMP_MARKER: &str = ".tmp.";

/// Temp sibling used while writing `path`: `.<name>.tmp.<pid>`
pub fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| WeatherError::io(path, std::io::Error::other("path has no parent")))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    Ok(parent.join(format!(".{}{}{}", name, TEMP_MARKER, std::process::id())))
}

/// Write `contents` to `path` so readers only ever see the old or the new file
///
/// The temp file lives in the same directory so the rename never crosses a
/// filesystem. On any failure the temp file is removed and the target is left
/// untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at_path(parent)?;
    }

    if let Err(e) = write_and_sync(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(WeatherError::io(path, e));
    }

    Ok(())
}

fn write_and_sync(temp_path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::File::create(temp_path).at_path(temp_path)?;
    file.write_all(contents).at_path(temp_path)?;
    file.sync_all().at_path(temp_path)?;
    Ok(())
}

/// Copy `src` over `dst` using [`write_atomic`]
pub fn copy_atomic(src: &Path, dst: &Path) -> Result<()> {
    let contents = fs::read(src).at_path(src)?;
    write_atomic(dst, &contents)
}

/// Move `path` aside to `target`, deleting it if the move fails
///
/// Returns the quarantine path when the move succeeded. A missing `path` is
/// not an error.
pub fn quarantine(path: &Path, target: &Path) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }

    match fs::rename(path, target) {
        Ok(()) => {
            tracing::info!(
                from = %path.display(),
                to = %target.display(),
                "quarantined untrusted file"
            );
            Some(target.to_path_buf())
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to quarantine file, deleting it instead"
            );
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete file");
            }
            None
        }
    }
}

/// Delete `*.tmp.*` files under `dir` older than `max_age`
///
/// Scans at most CLEANUP_SCAN_LIMIT files.
///
/// Returns (deleted_count, scanned_count, hit_limit)
pub fn cleanup_stale_temps(dir: &Path, max_age: Duration) -> Result<(usize, usize, bool)> {
    if !dir.exists() {
        return Ok((0, 0, false));
    }

    let mut scanned = 0;
    let mut deleted = 0;
    let now = SystemTime::now();

    // .garden/<file>, .garden/shadows/<file>, .garden/backups/<stamp>/<file>
    for entry in walkdir::WalkDir::new(dir)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if scanned >= CLEANUP_SCAN_LIMIT {
            tracing::warn!(
                limit = CLEANUP_SCAN_LIMIT,
                dir = %dir.display(),
                "hit temp cleanup scan limit"
            );
            return Ok((deleted, scanned, true));
        }

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        scanned += 1;

        let is_temp = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.contains(TEMP_MARKER));
        if !is_temp {
            continue;
        }

        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if matches!(age, Some(age) if age > max_age) {
            match fs::remove_file(path) {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to delete stale temp file"
                ),
            }
        }
    }

    Ok((deleted, scanned, false))
}

/// SHA-256 over each file's name and content, in order, hex encoded
///
/// The name is part of the digest so that swapping two files' contents is
/// detected.
pub fn content_checksum(dir: &Path, file_names: &[String]) -> Result<String> {
    let mut hasher = Sha256::new();
    for name in file_names {
        let path = dir.join(name);
        let contents = fs::read(&path).at_path(&path)?;
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }
    Ok(hex::encode(hasher.finalize()))
}
