//! Shadow copies and timestamped backups of the canonical context
//!
//! Layout under `.garden/`:
//! - `shadows/weather-context.shadow.json` (live shadow)
//! - `shadows/weather-context.shadow.<i>.json` (rotated, `i < shadow_copy_count`)
//! - `shadows/weather.shadow.md` (companion report)
//! - `backups/weather-context-<YYYYMMDD-HHMMSS>.json` (timestamped, count-pruned)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::atomic::{copy_atomic, quarantine, write_atomic};
use crate::config::ResilienceConfig;
use crate::context::{parse_document, read_document, WeatherContext};
use crate::error::{IoResultExt, Result, WeatherError};
use crate::paths::{
    is_timestamped_backup_name, parse_shadow_slot, GardenPaths, BACKUP_TIMESTAMP_FORMAT,
};

#[derive(Debug, Clone)]
pub struct ShadowCopyManager {
    paths: GardenPaths,
    shadow_copy_count: usize,
    backup_count: usize,
}

impl ShadowCopyManager {
    pub fn new(paths: GardenPaths, config: &ResilienceConfig) -> Self {
        Self {
            paths,
            shadow_copy_count: config.shadow_copy_count,
            backup_count: config.backup_count,
        }
    }

    /// Rotate shadows, write a new live shadow and a timestamped backup
    ///
    /// Fails without touching any shadow when the canonical file can't be
    /// read. Pruning old timestamped backups is best-effort.
    pub fn snapshot(&self) -> Result<()> {
        let context_path = self.paths.context_file();
        let contents = fs::read(&context_path).at_path(&context_path)?;

        let shadows_dir = self.paths.shadows_dir();
        fs::create_dir_all(&shadows_dir).at_path(&shadows_dir)?;

        self.rotate_shadows();
        write_atomic(&self.paths.live_shadow(), &contents)?;

        let companion = self.paths.companion_file();
        if companion.is_file() {
            copy_atomic(&companion, &self.paths.companion_shadow())?;
        }

        self.write_timestamped_backup(&contents)?;

        match self.prune_backups() {
            Ok(removed) if removed > 0 => tracing::debug!(removed, "pruned old backups"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to clean old backups"),
        }

        Ok(())
    }

    /// Parse `path` as a context document and check its invariants
    pub fn verify_integrity(&self, path: &Path) -> Result<WeatherContext> {
        read_document(path)
    }

    /// Replace the canonical file with the live shadow
    ///
    /// The shadow is verified first; the current canonical file is moved to
    /// the `.corrupt` quarantine (or deleted if the move fails).
    pub fn restore_from_shadow(&self) -> Result<()> {
        let shadow = self.paths.live_shadow();
        let contents = fs::read(&shadow).at_path(&shadow)?;
        parse_document(&shadow, &contents)?;

        quarantine(&self.paths.context_file(), &self.paths.corrupt_file());
        write_atomic(&self.paths.context_file(), &contents)?;

        let companion = self.paths.companion_file();
        let companion_shadow = self.paths.companion_shadow();
        if !companion.exists() && companion_shadow.is_file() {
            copy_atomic(&companion_shadow, &companion)?;
        }

        tracing::info!(shadow = %shadow.display(), "restored context from shadow copy");
        Ok(())
    }

    /// Replace the canonical file with the timestamped backup `name`
    ///
    /// The current state is snapshotted first (best-effort) so the restore
    /// itself can be undone.
    pub fn restore_from_backup(&self, name: &str) -> Result<()> {
        validate_backup_name(name)?;

        let backup_path = self.paths.backups_dir().join(name);
        let contents = match fs::read(&backup_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(WeatherError::BackupNotFound(name.to_string()))
            }
            Err(e) => return Err(WeatherError::io(&backup_path, e)),
        };
        parse_document(&backup_path, &contents)?;

        if let Err(e) = self.snapshot() {
            tracing::warn!(error = %e, "failed to create pre-restore backup");
        }

        write_atomic(&self.paths.context_file(), &contents)?;
        tracing::info!(backup = name, "restored context from backup");
        Ok(())
    }

    /// Timestamped backup file names, oldest first
    pub fn list_backups(&self) -> Result<Vec<String>> {
        self.backup_entries(true)
    }

    /// Live shadow followed by rotated slots in slot order, only those present
    pub fn list_shadows(&self) -> Vec<PathBuf> {
        let mut shadows = Vec::new();
        let live = self.paths.live_shadow();
        if live.is_file() {
            shadows.push(live);
        }
        shadows.extend(
            self.existing_slots()
                .into_iter()
                .map(|index| self.paths.shadow_slot(index)),
        );
        shadows
    }

    /// live -> slot 0, slot i -> slot i+1, oldest evicted
    fn rotate_shadows(&self) {
        // Slots beyond the configured count (config shrank) and the oldest slot go first
        for index in self.existing_slots() {
            if index + 1 >= self.shadow_copy_count {
                remove_logged(&self.paths.shadow_slot(index));
            }
        }

        let live = self.paths.live_shadow();
        if self.shadow_copy_count == 0 {
            return;
        }

        for index in (1..self.shadow_copy_count).rev() {
            let from = self.paths.shadow_slot(index - 1);
            if from.exists() {
                rename_logged(&from, &self.paths.shadow_slot(index));
            }
        }

        if live.exists() {
            rename_logged(&live, &self.paths.shadow_slot(0));
        }
    }

    /// Slot indices present on disk, ascending
    fn existing_slots(&self) -> Vec<usize> {
        let Ok(entries) = fs::read_dir(self.paths.shadows_dir()) else {
            return Vec::new();
        };

        let mut slots: Vec<usize> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(parse_shadow_slot))
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Write `weather-context-<stamp>.json` unless that name already exists
    fn write_timestamped_backup(&self, contents: &[u8]) -> Result<()> {
        let stamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let backup_path = self.paths.timestamped_backup(&stamp);

        // Backups are immutable; a second snapshot within the same second keeps the first
        if backup_path.exists() {
            tracing::debug!(path = %backup_path.display(), "timestamped backup already exists");
            return Ok(());
        }

        write_atomic(&backup_path, contents)
    }

    /// Keep only the newest `backup_count` timestamped backups
    ///
    /// Entries that can't be removed are logged and skipped.
    fn prune_backups(&self) -> Result<usize> {
        let backups = self.backup_entries(false)?;
        if backups.len() <= self.backup_count {
            return Ok(0);
        }

        let excess = backups.len() - self.backup_count;
        let mut removed = 0;
        for name in &backups[..excess] {
            let path = self.paths.backups_dir().join(name);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove old backup"
                ),
            }
        }
        Ok(removed)
    }

    /// Timestamped backup names in `backups/`, oldest first
    fn backup_entries(&self, files_only: bool) -> Result<Vec<String>> {
        let backups_dir = self.paths.backups_dir();
        let entries = match fs::read_dir(&backups_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WeatherError::io(&backups_dir, e)),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.at_path(&backups_dir)?;
            if files_only && !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_timestamped_backup_name(name) {
                    backups.push(name.to_string());
                }
            }
        }

        backups.sort();
        Ok(backups)
    }
}

/// Backup names are plain `weather-context-<stamp>.json` file names
fn validate_backup_name(name: &str) -> Result<()> {
    let is_plain = !name.contains("..") && !name.contains('/') && !name.contains('\\');
    if is_plain && is_timestamped_backup_name(name) {
        Ok(())
    } else {
        Err(WeatherError::InvalidBackupName(name.to_string()))
    }
}

fn rename_logged(from: &Path, to: &Path) {
    if let Err(e) = fs::rename(from, to) {
        tracing::warn!(
            from = %from.display(),
            to = %to.display(),
            error = %e,
            "failed to rotate shadow copy"
        );
    }
}

fn remove_logged(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to evict shadow copy");
    }
}
