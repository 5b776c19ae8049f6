// Path layout for a single garden
// Every component receives a GardenPaths value instead of rebuilding paths itself

use std::path::{Path, PathBuf};

/// Directory name holding all durable weather state
pub const GARDEN_DIR: &str = ".garden";
/// Canonical context file name
pub const CONTEXT_FILE: &str = "weather-context.json";
/// Human-readable companion report kept next to the garden root
pub const COMPANION_FILE: &str = "weather.md";
/// Metadata file written inside every full backup directory
pub const BACKUP_METADATA_FILE: &str = "backup-metadata.json";
/// Timestamp format used in backup file and directory names (UTC)
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const SHADOW_PREFIX: &str = "weather-context.shadow";
const TIMESTAMPED_BACKUP_PREFIX: &str = "weather-context-";

/// Resolved file layout for a garden root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GardenPaths {
    root: PathBuf,
}

impl GardenPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk up from `start` looking for a directory that contains `.garden` or `.git`
    pub fn discover(start: &Path) -> Option<Self> {
        let mut current = start.to_path_buf();
        loop {
            if current.join(GARDEN_DIR).is_dir() || current.join(".git").exists() {
                return Some(Self::new(current));
            }
            if !current.pop() {
                return None;
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/.garden`
    pub fn garden_dir(&self) -> PathBuf {
        self.root.join(GARDEN_DIR)
    }

    pub fn context_file(&self) -> PathBuf {
        self.garden_dir().join(CONTEXT_FILE)
    }

    /// Quarantine target for a canonical file that failed verification
    pub fn corrupt_file(&self) -> PathBuf {
        self.garden_dir().join("weather-context.corrupt.json")
    }

    pub fn companion_file(&self) -> PathBuf {
        self.root.join(COMPANION_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.garden_dir().join("resilience-config.json")
    }

    pub fn shadows_dir(&self) -> PathBuf {
        self.garden_dir().join("shadows")
    }

    pub fn live_shadow(&self) -> PathBuf {
        self.shadows_dir().join(format!("{}.json", SHADOW_PREFIX))
    }

    /// Rotated shadow in slot `index` (`weather-context.shadow.<index>.json`)
    pub fn shadow_slot(&self, index: usize) -> PathBuf {
        self.shadows_dir()
            .join(format!("{}.{}.json", SHADOW_PREFIX, index))
    }

    pub fn companion_shadow(&self) -> PathBuf {
        self.shadows_dir().join("weather.shadow.md")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.garden_dir().join("backups")
    }

    /// Timestamped single-file backup: `weather-context-<stamp>.json`
    pub fn timestamped_backup(&self, stamp: &str) -> PathBuf {
        self.backups_dir()
            .join(format!("{}{}.json", TIMESTAMPED_BACKUP_PREFIX, stamp))
    }

    /// Full backup set directory named by `stamp`
    pub fn full_backup_dir(&self, stamp: &str) -> PathBuf {
        self.backups_dir().join(stamp)
    }

    pub fn journal_file(&self) -> PathBuf {
        self.garden_dir().join("journal").join("weather-events.jsonl")
    }
}

/// Parse the slot index out of a rotated shadow file name
pub fn parse_shadow_slot(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(SHADOW_PREFIX)?
        .strip_prefix('.')?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// True for `weather-context-<stamp>.json` names
pub fn is_timestamped_backup_name(file_name: &str) -> bool {
    file_name
        .strip_prefix(TIMESTAMPED_BACKUP_PREFIX)
        .and_then(|rest| rest.strip_suffix(".json"))
        .map_or(false, |stamp| !stamp.is_empty())
}
