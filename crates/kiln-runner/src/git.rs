//! Change detection backed by the `git` CLI.
//!
//! The result is advisory only: it is reported in build logs and never used
//! to select which tasks run.

use async_trait::async_trait;
use kiln_core::ports::ChangeDetector;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

/// Reports files changed in a git working tree.
pub struct GitChangeDetector {
    repo_dir: PathBuf,
}

impl GitChangeDetector {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> Option<String> {
        let output = match Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Could not run git");
                return None;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(args = ?args, stderr = %stderr.trim(), "git command failed");
            return None;
        }

        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ChangeDetector for GitChangeDetector {
    async fn changed_files_since(&self, last_known_ref: Option<&str>) -> Option<Vec<String>> {
        let stdout = match last_known_ref {
            Some(from) => self.git(&["diff", "--name-only", from, "HEAD"]).await,
            // Staged and unstaged modifications in the working tree.
            None => self.git(&["diff", "--name-only", "HEAD"]).await,
        };

        let files: Option<Vec<String>> = stdout.map(|out| {
            out.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        });

        match &files {
            Some(files) => debug!(count = files.len(), "Detected changed files"),
            None => warn!("Could not detect changes, assuming full rebuild"),
        }

        files
    }
}

/// Change detector with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticChangeDetector {
    files: Option<Vec<String>>,
}

impl StaticChangeDetector {
    /// Always reports "unknown".
    pub fn unknown() -> Self {
        Self { files: None }
    }

    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: Some(files.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl ChangeDetector for StaticChangeDetector {
    async fn changed_files_since(&self, _last_known_ref: Option<&str>) -> Option<Vec<String>> {
        self.files.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outside_a_repository_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let detector = GitChangeDetector::new(dir.path());

        assert_eq!(detector.changed_files_since(None).await, None);
        assert_eq!(detector.changed_files_since(Some("HEAD~1")).await, None);
    }

    #[tokio::test]
    async fn test_static_detector() {
        let detector = StaticChangeDetector::with_files(["src/lib.rs"]);
        assert_eq!(
            detector.changed_files_since(None).await,
            Some(vec!["src/lib.rs".to_string()])
        );
        assert_eq!(StaticChangeDetector::unknown().changed_files_since(None).await, None);
    }
}
