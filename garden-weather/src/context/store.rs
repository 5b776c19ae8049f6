//! Canonical context store: load, atomic save, update
//!
//! Owns `.garden/weather-context.json`. Every write goes through
//! [`write_atomic`], so the file on disk is always either the previous
//! complete document or the new one.
//!
//! A corrupt or invalid canonical file is *not* recovered here. `load` logs a
//! warning and falls back to a fresh default document; restoring real state
//! is the job of the resilience layer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Duration as ChronoDuration, Utc};

use super::models::{
    FocusArea, GitContext, NextSteps, ProgressSummary, WeatherCondition, WeatherConditions,
    WeatherContext, CONTEXT_VERSION,
};
use crate::atomic::{self, write_atomic, CLEANUP_AGE_THRESHOLD};
use crate::error::{Result, WeatherError};
use crate::paths::GardenPaths;

#[derive(Debug, Clone)]
pub struct ContextStore {
    paths: GardenPaths,
}

impl ContextStore {
    pub fn new(paths: GardenPaths) -> Self {
        Self { paths }
    }

    /// Path of the canonical context file
    pub fn path(&self) -> PathBuf {
        self.paths.context_file()
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Load the context, creating a default document if none exists
    ///
    /// An unparsable or invalid file is replaced by a fresh default document.
    /// Read errors other than "not found" are returned to the caller.
    pub fn load(&self) -> Result<WeatherContext> {
        let path = self.path();

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no context file, creating default");
                return self.persist_default();
            }
            Err(e) => return Err(WeatherError::io(&path, e)),
        };

        match parse_document(&path, &data) {
            Ok(context) => Ok(context),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "corrupted weather context file, creating new one"
                );
                self.persist_default()
            }
        }
    }

    /// Stamp metadata and atomically replace the canonical file
    ///
    /// `updated` always moves strictly forward, even within one clock tick.
    /// A document that breaks a structural invariant is rejected before
    /// anything is written.
    pub fn save(&self, context: &mut WeatherContext) -> Result<()> {
        let path = self.path();

        let now = Utc::now();
        context.updated = if now > context.updated {
            now
        } else {
            context.updated + ChronoDuration::microseconds(1)
        };
        context.garden_path = self.paths.root().to_string_lossy().to_string();
        context.version = CONTEXT_VERSION.to_string();

        context
            .validate()
            .map_err(|reason| WeatherError::validation(&path, reason))?;

        let json = serde_json::to_vec_pretty(context)?;
        write_atomic(&path, &json)
    }

    /// Load, apply `mutator`, save; returns the saved document
    pub fn update<F>(&self, mutator: F) -> Result<WeatherContext>
    where
        F: FnOnce(&mut WeatherContext),
    {
        let mut context = self.load()?;
        mutator(&mut context);
        self.save(&mut context)?;
        Ok(context)
    }

    /// Conservative default document for a freshly initialized garden
    pub fn default_document(&self) -> WeatherContext {
        let now = Utc::now();

        WeatherContext {
            updated: now,
            session_id: generate_session_id(),
            garden_path: self.paths.root().to_string_lossy().to_string(),
            version: CONTEXT_VERSION.to_string(),
            current_focus: FocusArea {
                area: "initializing garden".to_string(),
                confidence: 1.0,
                last_active: now,
                inferred_from: "new garden created".to_string(),
            },
            recent_progress: ProgressSummary {
                summary: "Garden initialized".to_string(),
                commits: Vec::new(),
                timespan: "just now".to_string(),
                momentum: 0,
            },
            next_steps: NextSteps {
                suggestions: vec![
                    "Make your first commit to start tracking progress".to_string(),
                    "Begin working on your first feature".to_string(),
                ],
                priority: 50,
                based_on: "new garden initialization".to_string(),
            },
            weather: WeatherConditions {
                temperature: 20,
                condition: WeatherCondition::Sunny,
                pressure: 30,
                last_update: now,
            },
            git: GitContext {
                current_branch: "main".to_string(),
                recent_branches: vec!["main".to_string()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Remove temp files older than an hour left behind by crashed writers
    ///
    /// Returns (deleted_count, scanned_count)
    pub fn cleanup_stale_temps(&self) -> Result<(usize, usize)> {
        let (deleted, scanned, _) =
            atomic::cleanup_stale_temps(&self.paths.garden_dir(), CLEANUP_AGE_THRESHOLD)?;
        if deleted > 0 {
            tracing::info!(deleted, scanned, "removed stale temp files");
        }
        Ok((deleted, scanned))
    }

    fn persist_default(&self) -> Result<WeatherContext> {
        let mut context = self.default_document();
        self.save(&mut context)?;
        Ok(context)
    }
}

/// Parse and validate raw bytes as a context document read from `path`
pub fn parse_document(path: &Path, data: &[u8]) -> Result<WeatherContext> {
    let context: WeatherContext =
        serde_json::from_slice(data).map_err(|e| WeatherError::corruption(path, e))?;
    context
        .validate()
        .map_err(|reason| WeatherError::validation(path, reason))?;
    Ok(context)
}

/// Read, parse and validate the context document at `path`
pub fn read_document(path: &Path) -> Result<WeatherContext> {
    let data = fs::read(path).map_err(|e| WeatherError::io(path, e))?;
    parse_document(path, &data)
}

fn generate_session_id() -> String {
    format!("session_{}", Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::GitCommit;
    use tempfile::TempDir;

    fn test_store() -> (ContextStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = ContextStore::new(GardenPaths::new(temp_dir.path()));
        (store, temp_dir)
    }

    #[test]
    fn test_load_creates_default_when_missing() {
        let (store, _temp) = test_store();
        assert!(!store.exists());

        let context = store.load().unwrap();

        assert!(store.exists());
        assert_eq!(context.current_focus.area, "initializing garden");
        assert_eq!(context.version, CONTEXT_VERSION);
        assert!(context.session_id.starts_with("session_"));
        assert!(context.validate().is_ok());

        // The persisted file is the same document
        let on_disk = read_document(&store.path()).unwrap();
        assert_eq!(on_disk, context);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (store, _temp) = test_store();
        let mut context = store.default_document();
        context.current_focus.area = "authentication system".to_string();
        context.current_focus.confidence = 0.85;
        context.weather.temperature = 72;
        context.recent_progress.commits.push(GitCommit {
            hash: "abc123".to_string(),
            message: "feat: add login".to_string(),
            files_changed: vec!["auth/login.rs".to_string()],
            ..Default::default()
        });
        let before = context.updated;

        store.save(&mut context).unwrap();
        assert!(context.updated > before, "updated must advance");

        let loaded = store.load().unwrap();
        assert_eq!(loaded, context);
    }

    #[test]
    fn test_updated_advances_on_every_save() {
        let (store, _temp) = test_store();
        let mut context = store.default_document();
        // A timestamp far in the future still moves forward
        context.updated = Utc::now() + ChronoDuration::days(1);
        let future = context.updated;

        store.save(&mut context).unwrap();
        assert!(context.updated > future);
    }

    #[test]
    fn test_save_stamps_metadata() {
        let (store, temp) = test_store();
        let mut context = store.default_document();
        context.garden_path = "/somewhere/else".to_string();
        context.version = "0.9".to_string();

        store.save(&mut context).unwrap();

        assert_eq!(context.garden_path, temp.path().to_string_lossy());
        assert_eq!(context.version, CONTEXT_VERSION);
    }

    #[test]
    fn test_save_rejects_invalid_document() {
        let (store, _temp) = test_store();
        let original = store.load().unwrap();

        let mut invalid = original.clone();
        invalid.weather.temperature = 150;
        let err = store.save(&mut invalid).unwrap_err();
        assert!(matches!(err, WeatherError::Validation { .. }));

        // The canonical file is untouched
        assert_eq!(read_document(&store.path()).unwrap(), original);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let (store, _temp) = test_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), b"\x00\x01 this is not json {{{").unwrap();

        let context = store.load().unwrap();

        assert_eq!(context.current_focus.area, "initializing garden");
        assert!(read_document(&store.path()).is_ok(), "valid file left on disk");
    }

    #[test]
    fn test_invalid_document_falls_back_to_default() {
        let (store, _temp) = test_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"version": "1.0.0", "gardenPath": "/g"}"#).unwrap();

        let context = store.load().unwrap();
        assert!(!context.session_id.is_empty());
        assert!(read_document(&store.path()).is_ok());
    }

    #[test]
    fn test_update_applies_mutation() {
        let (store, _temp) = test_store();

        let updated = store
            .update(|ctx| {
                ctx.current_focus.area = "testing".to_string();
                ctx.weather.temperature = 45;
            })
            .unwrap();

        assert_eq!(updated.current_focus.area, "testing");
        let loaded = store.load().unwrap();
        assert_eq!(loaded.weather.temperature, 45);
    }

    #[test]
    fn test_update_rejecting_mutation_keeps_previous_file() {
        let (store, _temp) = test_store();
        let original = store.load().unwrap();

        let result = store.update(|ctx| ctx.current_focus.confidence = 2.0);
        assert!(result.is_err());
        assert_eq!(store.load().unwrap(), original);
    }

    #[test]
    fn test_read_error_is_surfaced() {
        let (store, _temp) = test_store();
        // A directory at the canonical path can't be read as a file
        fs::create_dir_all(store.path()).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, WeatherError::Io { .. }));
    }
}
