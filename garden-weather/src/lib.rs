// Shared atomic file I/O (temp + fsync + rename, quarantine, checksums)
pub mod atomic;

// Resilience configuration (.garden/resilience-config.json)
pub mod config;

// Weather context document and the canonical store
pub mod context;

pub mod error;

// Git accessor used by git-reconstruct recovery
pub mod git;

// Garden file layout
pub mod paths;

// Shadow copies, full backups and the recovery chain
pub mod resilience;

pub use config::ResilienceConfig;
pub use context::{ContextStore, WeatherContext};
pub use error::{Result, WeatherError};
pub use git::{GitCli, GitRepository};
pub use paths::GardenPaths;
pub use resilience::{
    RecoveryAttempt, RecoveryResult, RecoveryStrategy, ResilienceManager, ResilienceStatus,
    ShadowCopyManager,
};
