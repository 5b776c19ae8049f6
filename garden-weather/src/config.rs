// Resilience configuration
// Persisted at .garden/resilience-config.json and passed explicitly to every component

use std::fs;
use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::error::{Result, WeatherError};
use crate::paths::GardenPaths;

/// Environment variable overriding the recovery strategy order (comma-separated)
pub const STRATEGIES_ENV: &str = "GARDEN_RECOVERY_STRATEGIES";

/// Upper bound on rotated shadow slots
const MAX_SHADOW_COPIES: usize = 100;

/// Backup and recovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Whether `create_shadow_copy` does anything at all
    pub enable_shadow_copies: bool,
    /// Number of rotated shadow slots kept besides the live shadow
    pub shadow_copy_count: usize,
    /// Number of timestamped single-file backups kept
    pub backup_count: usize,
    /// Full backup directories older than this are pruned
    #[serde(rename = "backup_retention_secs", with = "duration_secs")]
    pub backup_retention: Duration,
    pub enable_journal: bool,
    /// Recovery strategies, tried in order
    pub recovery_strategies: Vec<String>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            enable_shadow_copies: true,
            shadow_copy_count: 3,
            backup_count: 10,
            backup_retention: Duration::from_secs(7 * 24 * 60 * 60),
            enable_journal: true,
            recovery_strategies: vec![
                "shadow".to_string(),
                "journal".to_string(),
                "git-reconstruct".to_string(),
            ],
        }
    }
}

impl ResilienceConfig {
    /// Load configuration for a garden, falling back to defaults
    ///
    /// A missing file yields defaults. An unparsable file is logged and
    /// replaced by defaults in memory (the file is left alone). A parseable
    /// file with invalid values is an error.
    pub fn load(paths: &GardenPaths) -> Result<Self> {
        let path = paths.config_file();

        let mut config = match fs::read(&path) {
            Ok(data) => match serde_json::from_slice::<Self>(&data) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "corrupted resilience config, using defaults"
                    );
                    Self::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(WeatherError::io(&path, e)),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Atomically write the configuration to `.garden/resilience-config.json`
    pub fn save(&self, paths: &GardenPaths) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(&paths.config_file(), &json)
    }

    /// Apply `GARDEN_RECOVERY_STRATEGIES` if set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(STRATEGIES_ENV) {
            self.recovery_strategies = parse_strategy_list(&value);
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_strategies(&self.recovery_strategies)?;

        if self.shadow_copy_count > MAX_SHADOW_COPIES {
            return Err(WeatherError::InvalidConfig(format!(
                "shadow_copy_count must be at most {}",
                MAX_SHADOW_COPIES
            )));
        }
        if self.backup_count == 0 {
            return Err(WeatherError::InvalidConfig(
                "backup_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Split a comma-separated strategy list, trimming whitespace
pub fn parse_strategy_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// The strategy list must be non-empty and contain no blank names
pub fn validate_strategies(strategies: &[String]) -> Result<()> {
    if strategies.is_empty() {
        return Err(WeatherError::InvalidConfig(
            "recovery_strategies must not be empty".to_string(),
        ));
    }
    if let Some(index) = strategies.iter().position(|s| s.trim().is_empty()) {
        return Err(WeatherError::InvalidConfig(format!(
            "recovery strategy #{} has a blank name",
            index + 1
        )));
    }
    Ok(())
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
