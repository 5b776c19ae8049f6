//! Full backup sets: `.garden/backups/<YYYYMMDD-HHMMSS>/`
//!
//! Each set holds copies of the tracked files plus `backup-metadata.json`
//! with a SHA-256 checksum over them. Sets are pruned by age.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::atomic::{content_checksum, copy_atomic, quarantine, write_atomic};
use crate::context::{parse_document, CONTEXT_VERSION};
use crate::error::{IoResultExt, Result, WeatherError};
use crate::paths::{
    GardenPaths, BACKUP_METADATA_FILE, BACKUP_TIMESTAMP_FORMAT, COMPANION_FILE, CONTEXT_FILE,
};

pub const FULL_BACKUP_TYPE: &str = "full";

/// Metadata written alongside every full backup set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub garden_path: String,
    /// Files included in the set, in checksum order
    pub files: Vec<String>,
    pub backup_type: String,
    /// Hex SHA-256 over the included files
    pub checksum: String,
}

/// Create a full backup set for the garden and return its directory
///
/// The canonical document must verify before anything is created. A missing
/// `weather.md` is left out of the set. Creating two sets within the same
/// second reuses the directory.
pub fn create_full_backup(paths: &GardenPaths) -> Result<PathBuf> {
    let context_path = paths.context_file();
    let contents = fs::read(&context_path).at_path(&context_path)?;
    parse_document(&context_path, &contents)?;

    let now = Utc::now();
    let stamp = now.format(BACKUP_TIMESTAMP_FORMAT).to_string();
    let backup_dir = paths.full_backup_dir(&stamp);
    fs::create_dir_all(&backup_dir).at_path(&backup_dir)?;

    write_atomic(&backup_dir.join(CONTEXT_FILE), &contents)?;
    let mut files = vec![CONTEXT_FILE.to_string()];

    let companion = paths.companion_file();
    let companion_copy = backup_dir.join(COMPANION_FILE);
    if companion.is_file() {
        copy_atomic(&companion, &companion_copy)?;
        files.push(COMPANION_FILE.to_string());
    } else if companion_copy.exists() {
        // Left by an earlier set in the same second
        fs::remove_file(&companion_copy).at_path(&companion_copy)?;
    }

    let metadata = BackupMetadata {
        timestamp: now,
        version: CONTEXT_VERSION.to_string(),
        garden_path: paths.root().to_string_lossy().to_string(),
        checksum: content_checksum(&backup_dir, &files)?,
        files,
        backup_type: FULL_BACKUP_TYPE.to_string(),
    };
    let json = serde_json::to_vec_pretty(&metadata)?;
    write_atomic(&backup_dir.join(BACKUP_METADATA_FILE), &json)?;

    tracing::info!(
        dir = %backup_dir.display(),
        files = metadata.files.len(),
        "created full backup"
    );
    Ok(backup_dir)
}

/// Delete full backup sets whose name stamp is older than `retention`
///
/// The set named `keep` is never removed, whatever its age. Individual
/// failures are logged and skipped. Returns the number removed.
pub fn prune_full_backups(
    paths: &GardenPaths,
    retention: Duration,
    keep: Option<&str>,
) -> Result<usize> {
    let cutoff = match chrono::Duration::from_std(retention) {
        Ok(retention) => Utc::now() - retention,
        // Retention too large to represent: nothing is ever old enough
        Err(_) => return Ok(0),
    };

    let mut removed = 0;
    for name in stamped_entries(paths, false)? {
        if keep == Some(name.as_str()) {
            continue;
        }
        let Some(created) = parse_backup_stamp(&name) else {
            continue;
        };
        if created >= cutoff {
            continue;
        }

        let dir = paths.full_backup_dir(&name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(dir = %dir.display(), "pruned expired full backup");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to prune full backup")
            }
        }
    }
    Ok(removed)
}

/// Full backup directory names, oldest first
pub fn list_full_backups(paths: &GardenPaths) -> Result<Vec<String>> {
    stamped_entries(paths, true)
}

/// Names under `backups/` that parse as a set stamp, sorted
///
/// Pruning looks at every such entry so a stray file squatting on a stamp
/// name is reported instead of silently ignored.
fn stamped_entries(paths: &GardenPaths, dirs_only: bool) -> Result<Vec<String>> {
    let backups_dir = paths.backups_dir();
    let entries = match fs::read_dir(&backups_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(WeatherError::io(&backups_dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.at_path(&backups_dir)?;
        if dirs_only && !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if parse_backup_stamp(name).is_some() {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

/// Recompute a backup set's checksum and compare it with its metadata
pub fn verify_backup(backup_dir: &Path) -> Result<BackupMetadata> {
    let metadata = read_metadata(backup_dir)?;
    let actual = content_checksum(backup_dir, &metadata.files)?;

    if actual != metadata.checksum {
        return Err(WeatherError::ChecksumMismatch {
            path: backup_dir.to_path_buf(),
            expected: metadata.checksum,
            actual,
        });
    }
    Ok(metadata)
}

/// Restore the canonical file (and `weather.md`) from a full backup set
///
/// Nothing is touched until the checksum (when metadata is present) and the
/// document itself have been verified.
pub fn restore_full_backup(paths: &GardenPaths, backup_dir: &Path) -> Result<()> {
    let listed = if backup_dir.join(BACKUP_METADATA_FILE).exists() {
        Some(verify_backup(backup_dir)?.files)
    } else {
        None
    };

    let source = backup_dir.join(CONTEXT_FILE);
    let contents = fs::read(&source).at_path(&source)?;
    parse_document(&source, &contents)?;

    quarantine(&paths.context_file(), &paths.corrupt_file());
    write_atomic(&paths.context_file(), &contents)?;

    // Only a companion covered by the checksum is trusted
    let companion = backup_dir.join(COMPANION_FILE);
    let companion_listed = listed
        .as_ref()
        .map_or(true, |files| files.iter().any(|f| f == COMPANION_FILE));
    if companion_listed && companion.is_file() {
        copy_atomic(&companion, &paths.companion_file())?;
    }

    tracing::info!(dir = %backup_dir.display(), "restored context from full backup");
    Ok(())
}

fn read_metadata(backup_dir: &Path) -> Result<BackupMetadata> {
    let path = backup_dir.join(BACKUP_METADATA_FILE);
    let data = fs::read(&path).at_path(&path)?;
    serde_json::from_slice(&data).map_err(|e| WeatherError::corruption(&path, e))
}

/// Directory names are `YYYYMMDD-HHMMSS` in UTC
fn parse_backup_stamp(name: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(name, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use tempfile::TempDir;

    fn garden() -> (GardenPaths, ContextStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let paths = GardenPaths::new(temp_dir.path());
        let store = ContextStore::new(paths.clone());
        (paths, store, temp_dir)
    }

    #[test]
    fn test_create_full_backup_writes_metadata() {
        let (paths, store, _temp) = garden();
        store.load().unwrap();
        fs::write(paths.companion_file(), "# Weather").unwrap();

        let dir = create_full_backup(&paths).unwrap();

        assert!(dir.join(CONTEXT_FILE).is_file());
        assert!(dir.join(COMPANION_FILE).is_file());
        let metadata = verify_backup(&dir).unwrap();
        assert_eq!(metadata.files, vec![CONTEXT_FILE, COMPANION_FILE]);
        assert_eq!(metadata.backup_type, "full");
        assert_eq!(metadata.version, CONTEXT_VERSION);
        assert_eq!(metadata.checksum.len(), 64);

        let raw = fs::read_to_string(dir.join(BACKUP_METADATA_FILE)).unwrap();
        assert!(raw.contains("\"garden_path\""));
    }

    #[test]
    fn test_missing_files_are_left_out() {
        let (paths, store, _temp) = garden();
        store.load().unwrap();

        let dir = create_full_backup(&paths).unwrap();
        let metadata = verify_backup(&dir).unwrap();
        assert_eq!(metadata.files, vec![CONTEXT_FILE]);
        assert!(!dir.join(COMPANION_FILE).exists());
    }

    #[test]
    fn test_create_requires_valid_canonical() {
        let (paths, _store, _temp) = garden();

        let err = create_full_backup(&paths).unwrap_err();
        assert!(err.is_not_found());
        assert!(!paths.backups_dir().exists());

        fs::create_dir_all(paths.garden_dir()).unwrap();
        fs::write(paths.context_file(), "{ half a docu").unwrap();
        let err = create_full_backup(&paths).unwrap_err();
        assert!(err.is_corruption());
        assert!(!paths.backups_dir().exists());
    }

    #[test]
    fn test_same_second_set_drops_stale_companion() {
        let (paths, store, _temp) = garden();
        store.load().unwrap();
        fs::write(paths.companion_file(), "# Weather").unwrap();
        let first = create_full_backup(&paths).unwrap();

        // Simulate a second set landing in the same directory without weather.md
        fs::remove_file(paths.companion_file()).unwrap();
        fs::write(first.join(COMPANION_FILE), "# Stale").unwrap();
        let second = create_full_backup(&paths).unwrap();

        assert!(!second.join(COMPANION_FILE).exists());
        assert_eq!(verify_backup(&second).unwrap().files, vec![CONTEXT_FILE]);
    }

    #[test]
    fn test_verify_detects_tampering() {
        let (paths, store, _temp) = garden();
        store.load().unwrap();
        let dir = create_full_backup(&paths).unwrap();

        fs::write(dir.join(CONTEXT_FILE), "{}").unwrap();

        let err = verify_backup(&dir).unwrap_err();
        assert!(matches!(err, WeatherError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_prune_by_age() {
        let (paths, store, _temp) = garden();
        store.load().unwrap();
        let old = paths.full_backup_dir("20200101-000000");
        let recent_stamp = (Utc::now() - chrono::Duration::hours(1))
            .format(BACKUP_TIMESTAMP_FORMAT)
            .to_string();
        let recent = paths.full_backup_dir(&recent_stamp);
        fs::create_dir_all(&old).unwrap();
        fs::create_dir_all(&recent).unwrap();
        // Not a backup set name, never pruned
        fs::create_dir_all(paths.backups_dir().join("keep-me")).unwrap();

        let week = Duration::from_secs(7 * 24 * 3600);
        let removed = prune_full_backups(&paths, week, None).unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(paths.backups_dir().join("keep-me").exists());
    }

    #[test]
    fn test_prune_spares_kept_set() {
        let (paths, store, _temp) = garden();
        store.load().unwrap();
        let old = paths.full_backup_dir("20200101-000000");
        fs::create_dir_all(&old).unwrap();
        let fresh = create_full_backup(&paths).unwrap();
        let fresh_name = fresh.file_name().unwrap().to_str().unwrap();

        let removed = prune_full_backups(&paths, Duration::ZERO, Some(fresh_name)).unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.is_dir());
    }

    #[test]
    fn test_prune_skips_entries_it_cannot_remove() {
        let (paths, _store, _temp) = garden();
        fs::create_dir_all(paths.backups_dir()).unwrap();
        // A plain file squatting on a set name can't be removed as a directory
        let squatter = paths.backups_dir().join("20200101-000000");
        fs::write(&squatter, "not a set").unwrap();
        let old = paths.full_backup_dir("20200102-000000");
        fs::create_dir_all(&old).unwrap();

        let removed = prune_full_backups(&paths, Duration::ZERO, None).unwrap();

        assert_eq!(removed, 1);
        assert!(squatter.is_file());
        assert!(!old.exists());
    }

    #[test]
    fn test_list_full_backups_ignores_files() {
        let (paths, _store, _temp) = garden();
        assert!(list_full_backups(&paths).unwrap().is_empty());

        fs::create_dir_all(paths.full_backup_dir("20260102-000000")).unwrap();
        fs::create_dir_all(paths.full_backup_dir("20260101-000000")).unwrap();
        fs::write(paths.timestamped_backup("20260101-000000"), "{}").unwrap();

        assert_eq!(
            list_full_backups(&paths).unwrap(),
            vec!["20260101-000000", "20260102-000000"]
        );
    }

    #[test]
    fn test_restore_full_backup() {
        let (paths, store, _temp) = garden();
        store
            .update(|ctx| ctx.current_focus.area = "backed up".to_string())
            .unwrap();
        fs::write(paths.companion_file(), "# Backed up").unwrap();
        let dir = create_full_backup(&paths).unwrap();

        fs::write(paths.context_file(), "garbage").unwrap();
        fs::remove_file(paths.companion_file()).unwrap();

        restore_full_backup(&paths, &dir).unwrap();

        assert_eq!(store.load().unwrap().current_focus.area, "backed up");
        assert_eq!(
            fs::read_to_string(paths.companion_file()).unwrap(),
            "# Backed up"
        );
        assert_eq!(fs::read_to_string(paths.corrupt_file()).unwrap(), "garbage");
    }

    #[test]
    fn test_restore_ignores_unlisted_companion() {
        let (paths, store, _temp) = garden();
        store.load().unwrap();
        let dir = create_full_backup(&paths).unwrap();
        fs::write(dir.join(COMPANION_FILE), "# Not in the checksum").unwrap();

        restore_full_backup(&paths, &dir).unwrap();

        assert!(!paths.companion_file().exists());
    }

    #[test]
    fn test_restore_refuses_tampered_backup() {
        let (paths, store, _temp) = garden();
        store.load().unwrap();
        let dir = create_full_backup(&paths).unwrap();
        fs::write(dir.join(CONTEXT_FILE), "tampered").unwrap();
        let before = fs::read(paths.context_file()).unwrap();

        assert!(restore_full_backup(&paths, &dir).is_err());
        assert_eq!(fs::read(paths.context_file()).unwrap(), before);
    }
}
