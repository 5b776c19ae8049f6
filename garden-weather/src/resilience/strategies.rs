//! Recovery strategies and the registry the recovery chain dispatches through
//!
//! Each strategy either restores a trustworthy canonical file or returns an
//! error describing why it couldn't. Strategies never retry.

use std::collections::BTreeMap;

use chrono::Utc;

use super::backup::{list_full_backups, restore_full_backup};
use super::shadow::ShadowCopyManager;
use crate::config::ResilienceConfig;
use crate::context::{ContextStore, FocusArea, GitCommit};
use crate::error::{Result, WeatherError};
use crate::git::GitRepository;
use crate::paths::GardenPaths;

/// Number of commits the git-reconstruct strategy reads
const RECONSTRUCT_COMMIT_LIMIT: usize = 10;

/// Everything a strategy may touch while recovering
pub struct RecoveryEnv<'a> {
    pub paths: &'a GardenPaths,
    pub config: &'a ResilienceConfig,
    pub store: &'a ContextStore,
    pub shadows: &'a ShadowCopyManager,
    pub git: &'a dyn GitRepository,
}

/// A single way of getting a trustworthy canonical file back
pub trait RecoveryStrategy: Send + Sync {
    /// Name used in the configured strategy order
    fn name(&self) -> &str;

    fn attempt(&self, env: &RecoveryEnv<'_>) -> Result<()>;
}

/// Restore from the live shadow copy
pub struct ShadowStrategy;

impl RecoveryStrategy for ShadowStrategy {
    fn name(&self) -> &str {
        "shadow"
    }

    fn attempt(&self, env: &RecoveryEnv<'_>) -> Result<()> {
        if !env.paths.live_shadow().is_file() {
            return Err(WeatherError::StrategyFailed("no shadow copy found".to_string()));
        }
        env.shadows.restore_from_shadow()
    }
}

/// Journal replay slot; there is no journal writer yet, so this always fails
pub struct JournalStrategy;

impl RecoveryStrategy for JournalStrategy {
    fn name(&self) -> &str {
        "journal"
    }

    fn attempt(&self, env: &RecoveryEnv<'_>) -> Result<()> {
        if !env.config.enable_journal {
            return Err(WeatherError::StrategyFailed(
                "journal disabled in resilience config".to_string(),
            ));
        }
        let journal = env.paths.journal_file();
        if !journal.exists() {
            return Err(WeatherError::StrategyFailed(format!(
                "no journal found at {}",
                journal.display()
            )));
        }
        Err(WeatherError::StrategyFailed(
            "journal recovery not implemented".to_string(),
        ))
    }
}

/// Rebuild a low-confidence context from recent git history
pub struct GitReconstructStrategy;

impl RecoveryStrategy for GitReconstructStrategy {
    fn name(&self) -> &str {
        "git-reconstruct"
    }

    fn attempt(&self, env: &RecoveryEnv<'_>) -> Result<()> {
        let commits = env.git.recent_commits(RECONSTRUCT_COMMIT_LIMIT)?;
        let now = Utc::now();

        let mut context = env.store.default_document();
        context.current_focus = FocusArea {
            area: infer_focus_area(&commits).to_string(),
            confidence: 0.5,
            last_active: now,
            inferred_from: "git history recovery".to_string(),
        };
        context.recent_progress.summary = format!(
            "Reconstructed from {} recent commit(s) after data loss",
            commits.len()
        );
        context.recent_progress.timespan = "unknown".to_string();
        context.next_steps.based_on = "git history recovery".to_string();

        match env.git.current_branch() {
            Ok(branch) => {
                context.git.current_branch = branch.clone();
                context.git.recent_branches = vec![branch];
            }
            Err(e) => tracing::debug!(error = %e, "current branch unavailable during recovery"),
        }
        match env.git.has_uncommitted_changes() {
            Ok(dirty) => context.git.uncommitted_changes = dirty,
            Err(e) => {
                tracing::debug!(error = %e, "working tree status unavailable during recovery")
            }
        }
        if let Some(latest) = commits.first() {
            context.git.last_commit = latest.clone();
        }
        context.recent_progress.commits = commits;

        env.store.save(&mut context)
    }
}

/// Focus area guessed from the most recent commit message
fn infer_focus_area(commits: &[GitCommit]) -> &'static str {
    let Some(latest) = commits.first() else {
        return "unknown";
    };

    let message = latest.message.to_lowercase();
    if message.contains("doc") {
        "documentation"
    } else if message.contains("test") {
        "testing"
    } else {
        "development"
    }
}

/// Restore from the most recent full backup set
pub struct BackupStrategy;

impl RecoveryStrategy for BackupStrategy {
    fn name(&self) -> &str {
        "backup"
    }

    fn attempt(&self, env: &RecoveryEnv<'_>) -> Result<()> {
        let latest = list_full_backups(env.paths)?
            .pop()
            .ok_or_else(|| WeatherError::StrategyFailed("no backups found".to_string()))?;
        restore_full_backup(env.paths, &env.paths.full_backup_dir(&latest))
    }
}

/// Strategies keyed by name
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Box<dyn RecoveryStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the shadow, journal, git-reconstruct and backup strategies
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ShadowStrategy));
        registry.register(Box::new(JournalStrategy));
        registry.register(Box::new(GitReconstructStrategy));
        registry.register(Box::new(BackupStrategy));
        registry
    }

    /// Add a strategy, replacing any existing one with the same name
    pub fn register(&mut self, strategy: Box<dyn RecoveryStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<&dyn RecoveryStrategy> {
        self.strategies.get(name).map(|s| s.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}
