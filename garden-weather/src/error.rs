//! Error types shared by the store, shadow and resilience layers

use std::io;
use std::path::{Path, PathBuf};

/// Errors produced by the durability engine.
///
/// `Corruption` and `Validation` are the two flavours of "this file can't be
/// trusted"; callers that only care about that distinction should use
/// [`WeatherError::is_corruption`].
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// Read, write, rename or directory operation failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File exists but is not a parseable context document.
    #[error("corrupt document at {}: {source}", .path.display())]
    Corruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Document parsed but breaks a structural invariant.
    #[error("invalid document at {}: {reason}", .path.display())]
    Validation { path: PathBuf, reason: String },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("backup not found: {0}")]
    BackupNotFound(String),

    #[error("invalid backup name: {0:?}")]
    InvalidBackupName(String),

    #[error(
        "checksum mismatch for backup {}: expected {expected}, found {actual}",
        .path.display()
    )]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("unknown recovery strategy: {0}")]
    UnknownStrategy(String),

    /// A recovery strategy ran and could not restore the context.
    #[error("{0}")]
    StrategyFailed(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, WeatherError>;

impl WeatherError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        WeatherError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn corruption(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        WeatherError::Corruption {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn validation(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        WeatherError::Validation {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True for unparsable or structurally invalid documents
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            WeatherError::Corruption { .. } | WeatherError::Validation { .. }
        )
    }

    /// True when the underlying I/O error is "file not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, WeatherError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Extension for attaching a path to raw `io::Result`s
pub(crate) trait IoResultExt<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| WeatherError::io(path, e))
    }
}
