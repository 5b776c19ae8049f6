use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use garden_weather::context::GitCommit;
use garden_weather::{GitRepository, Result, WeatherError};

/// In-memory GitRepository so tests never need a git binary
#[derive(Default)]
pub struct FakeGit {
    branch: Option<String>,
    commits: Vec<GitCommit>,
    dirty: bool,
    unavailable: bool,
    log_calls: Arc<AtomicUsize>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            branch: Some("main".to_string()),
            ..Default::default()
        }
    }

    /// Every call fails as if the garden had no repository
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn on_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    /// Add a commit; the first one added is the most recent
    pub fn with_commit(mut self, message: &str) -> Self {
        let n = self.commits.len();
        self.commits.push(GitCommit {
            hash: format!("{:07x}{}", 0xabc0000 + n, n),
            message: message.to_string(),
            author: "Tester".to_string(),
            timestamp: Utc
                .timestamp_opt(1_770_000_000 - n as i64 * 60, 0)
                .single()
                .unwrap(),
            files_changed: vec![format!("src/file_{}.rs", n)],
            ..Default::default()
        });
        self
    }

    /// Shared count of `recent_commits` calls, readable after the fake is boxed
    pub fn log_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.log_calls)
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            Err(WeatherError::Git("not a git repository".to_string()))
        } else {
            Ok(())
        }
    }
}

impl GitRepository for FakeGit {
    fn current_branch(&self) -> Result<String> {
        self.check()?;
        self.branch
            .clone()
            .ok_or_else(|| WeatherError::Git("detached HEAD".to_string()))
    }

    fn recent_commits(&self, limit: usize) -> Result<Vec<GitCommit>> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.commits.iter().take(limit).cloned().collect())
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        self.check()?;
        Ok(self.dirty)
    }
}
