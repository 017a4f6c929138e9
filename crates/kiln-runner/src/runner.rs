//! Core runner trait and types.

use async_trait::async_trait;
use kiln_core::ids::BuildId;
use kiln_core::task::{Task, TaskResult};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line from task execution.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub task_id: String,
    pub stream: OutputStream,
    pub content: String,
    pub line_number: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Output stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Trait for task execution.
///
/// Implementations never fail past their own boundary: every problem,
/// including not being able to start the process, is encoded in the
/// returned [`TaskResult`].
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Execute a task, streaming output lines to `output_tx` as they arrive.
    async fn run(
        &self,
        task: &Task,
        build_id: BuildId,
        output_tx: Option<mpsc::Sender<OutputLine>>,
    ) -> TaskResult;
}

/// Configuration for task execution.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Working directory for tasks that do not name one.
    pub workspace: PathBuf,
    /// Shell used to interpret commands. `None` picks the platform shell.
    pub shell: Option<String>,
    /// Extra environment variables for every task.
    pub env: HashMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            shell: None,
            env: HashMap::new(),
        }
    }
}

impl RunnerConfig {
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }
}
