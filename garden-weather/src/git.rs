//! Git repository accessor used by the git-reconstruct recovery strategy
//!
//! Defines the GitRepository trait so recovery depends on an abstraction,
//! not on a git binary being present. `GitCli` is the real implementation.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, TimeZone, Utc};

use crate::context::GitCommit;
use crate::error::{Result, WeatherError};

/// Read-only view of the garden's git repository
pub trait GitRepository: Send + Sync {
    fn current_branch(&self) -> Result<String>;
    /// Most recent commits, newest first
    fn recent_commits(&self, limit: usize) -> Result<Vec<GitCommit>>;
    fn has_uncommitted_changes(&self) -> Result<bool>;
}

/// GitRepository backed by the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
}

impl GitCli {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .map_err(|e| WeatherError::Git(format!("failed to run git {}: {}", args[0], e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WeatherError::Git(format!(
                "git {} failed: {}",
                args[0],
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitRepository for GitCli {
    fn current_branch(&self) -> Result<String> {
        let branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(branch.trim().to_string())
    }

    fn recent_commits(&self, limit: usize) -> Result<Vec<GitCommit>> {
        let count = format!("-{}", limit);
        let output = self.run(&[
            "log",
            &count,
            "--pretty=format:%H|%s|%an|%at",
            "--name-only",
        ])?;
        Ok(parse_git_log(&output))
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        let status = self.run(&["status", "--porcelain"])?;
        Ok(!status.trim().is_empty())
    }
}

/// Parse `git log --pretty=format:%H|%s|%an|%at --name-only` output
///
/// Each commit is a `hash|subject|author|unix-time` header line followed by
/// the files it touched. Malformed headers are skipped.
pub fn parse_git_log(output: &str) -> Vec<GitCommit> {
    let mut commits = Vec::new();
    let mut lines = output.trim().lines().peekable();

    while let Some(line) = lines.next() {
        let Some(mut commit) = parse_header(line) else {
            continue;
        };

        while let Some(next) = lines.peek() {
            if next.is_empty() || parse_header(next).is_some() {
                break;
            }
            commit.files_changed.push(next.trim().to_string());
            lines.next();
        }

        commits.push(commit);
    }

    commits
}

fn parse_header(line: &str) -> Option<GitCommit> {
    let parts: Vec<&str> = line.split('|').collect();
    // Subjects may contain '|', so take hash from the front and author/time from the back
    if parts.len() < 4 {
        return None;
    }
    let hash = parts[0];
    if hash.len() < 7 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let seconds: i64 = parts[parts.len() - 1].trim().parse().ok()?;
    let timestamp: DateTime<Utc> = Utc.timestamp_opt(seconds, 0).single()?;

    Some(GitCommit {
        hash: hash.to_string(),
        message: parts[1..parts.len() - 2].join("|"),
        author: parts[parts.len() - 2].to_string(),
        timestamp,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_git_log() {
        let output = "\
a1b2c3d4e5f6|docs: update readme|Ada|1770383553
README.md
docs/guide.md

0f9e8d7c6b5a|test: cover restore | edge cases|Grace|1770380000
src/restore.rs
";
        let commits = parse_git_log(output);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "a1b2c3d4e5f6");
        assert_eq!(commits[0].message, "docs: update readme");
        assert_eq!(commits[0].author, "Ada");
        assert_eq!(commits[0].timestamp.timestamp(), 1770383553);
        assert_eq!(commits[0].files_changed, vec!["README.md", "docs/guide.md"]);

        assert_eq!(commits[1].message, "test: cover restore | edge cases");
        assert_eq!(commits[1].author, "Grace");
        assert_eq!(commits[1].files_changed, vec!["src/restore.rs"]);
    }

    #[test]
    fn test_parse_git_log_skips_malformed_headers() {
        let output = "not a header\nabc1234|msg|author|not-a-number\nabc1234|ok|me|1770000000\n";
        let commits = parse_git_log(output);

        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "ok");
    }

    #[test]
    fn test_parse_empty_log() {
        assert!(parse_git_log("").is_empty());
    }

    #[test]
    fn test_cli_outside_repository_fails() {
        let temp_dir = TempDir::new().unwrap();
        let git = GitCli::new(temp_dir.path());

        // Either git is missing or the directory isn't a repository
        assert!(matches!(git.recent_commits(5), Err(WeatherError::Git(_))));
    }
}
