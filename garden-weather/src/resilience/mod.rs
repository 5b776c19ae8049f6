//! Backup and disaster recovery around the canonical context file
//!
//! - `shadow`: live/rotated shadow copies and timestamped backups
//! - `backup`: full backup sets with checksummed metadata
//! - `strategies`: the recovery strategies and their registry
//! - `recovery`: the chain that tries strategies in configured order

pub mod backup;
pub mod recovery;
pub mod shadow;
pub mod strategies;

use std::path::{Path, PathBuf};

use serde::Serialize;

pub use backup::BackupMetadata;
pub use recovery::{ChainState, RecoveryAttempt, RecoveryChain, RecoveryResult};
pub use shadow::ShadowCopyManager;
pub use strategies::{RecoveryEnv, RecoveryStrategy, StrategyRegistry};

use crate::config::ResilienceConfig;
use crate::context::{read_document, ContextStore};
use crate::error::Result;
use crate::git::GitRepository;
use crate::paths::GardenPaths;

/// Snapshot of what the garden currently has to recover from
#[derive(Debug, Clone, Serialize)]
pub struct ResilienceStatus {
    pub context_exists: bool,
    /// Why the canonical file failed verification, if it did
    pub context_error: Option<String>,
    pub companion_exists: bool,
    pub shadow_copies_enabled: bool,
    pub shadows: Vec<PathBuf>,
    pub backups: Vec<String>,
    pub full_backups: Vec<String>,
    pub recovery_strategies: Vec<String>,
}

impl ResilienceStatus {
    pub fn context_healthy(&self) -> bool {
        self.context_exists && self.context_error.is_none()
    }
}

pub struct ResilienceManager {
    paths: GardenPaths,
    config: ResilienceConfig,
    store: ContextStore,
    shadows: ShadowCopyManager,
    git: Box<dyn GitRepository>,
    registry: StrategyRegistry,
}

impl ResilienceManager {
    pub fn new(paths: GardenPaths, config: ResilienceConfig, git: Box<dyn GitRepository>) -> Self {
        let store = ContextStore::new(paths.clone());
        let shadows = ShadowCopyManager::new(paths.clone(), &config);
        Self {
            paths,
            config,
            store,
            shadows,
            git,
            registry: StrategyRegistry::with_defaults(),
        }
    }

    pub fn paths(&self) -> &GardenPaths {
        &self.paths
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn shadows(&self) -> &ShadowCopyManager {
        &self.shadows
    }

    /// Add or replace a named recovery strategy
    pub fn register_strategy(&mut self, strategy: Box<dyn RecoveryStrategy>) {
        self.registry.register(strategy);
    }

    /// Create a full backup set, then prune other sets past the retention window
    pub fn create_backup(&self) -> Result<PathBuf> {
        let dir = backup::create_full_backup(&self.paths)?;
        let created = dir.file_name().and_then(|name| name.to_str());

        match backup::prune_full_backups(&self.paths, self.config.backup_retention, created) {
            Ok(removed) if removed > 0 => tracing::info!(removed, "pruned expired full backups"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to prune old backups"),
        }

        Ok(dir)
    }

    /// Snapshot the canonical file into the shadow copies (no-op when disabled)
    pub fn create_shadow_copy(&self) -> Result<()> {
        if !self.config.enable_shadow_copies {
            tracing::debug!("shadow copies disabled, skipping snapshot");
            return Ok(());
        }
        self.shadows.snapshot()
    }

    /// Run the configured recovery strategies in order
    ///
    /// Strategy failures are recorded in the result, not returned. The only
    /// error is an empty or blank strategy order.
    pub fn recover_from_disaster(&self) -> Result<RecoveryResult> {
        let chain = RecoveryChain::new(self.config.recovery_strategies.clone())?;
        let env = RecoveryEnv {
            paths: &self.paths,
            config: &self.config,
            store: &self.store,
            shadows: &self.shadows,
            git: self.git.as_ref(),
        };

        let result = chain.run(&self.registry, &env);
        if result.success {
            tracing::info!(attempts = result.attempts.len(), "disaster recovery complete");
        } else {
            tracing::warn!(attempts = result.attempts.len(), "all recovery strategies failed");
        }
        Ok(result)
    }

    pub fn verify_backup(&self, backup_dir: &Path) -> Result<BackupMetadata> {
        backup::verify_backup(backup_dir)
    }

    pub fn list_full_backups(&self) -> Result<Vec<String>> {
        backup::list_full_backups(&self.paths)
    }

    pub fn status(&self) -> Result<ResilienceStatus> {
        let context_path = self.paths.context_file();
        let context_exists = context_path.is_file();
        let context_error = if context_exists {
            read_document(&context_path).err().map(|e| e.to_string())
        } else {
            None
        };

        Ok(ResilienceStatus {
            context_exists,
            context_error,
            companion_exists: self.paths.companion_file().is_file(),
            shadow_copies_enabled: self.config.enable_shadow_copies,
            shadows: self.shadows.list_shadows(),
            backups: self.shadows.list_backups()?,
            full_backups: self.list_full_backups()?,
            recovery_strategies: self.config.recovery_strategies.clone(),
        })
    }
}
