//! Task definitions, build submissions and task results.
//!
//! These types represent the client-authored build configuration and the
//! structured outcome of running a single task.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{Error, Result};

/// A single unit of work: a shell command plus the ids it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, alias = "cwd", skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

impl Task {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            dependencies: Vec::new(),
            working_directory: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

/// Build submission payload.
///
/// Wire shape: `{ "tasks": [ { "id", "command", "dependencies"?, "workingDirectory"? } ] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
}

impl BuildConfig {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            triggered_by: None,
        }
    }

    /// Reject submissions that can never produce a build.
    ///
    /// Graph problems (unknown ids, cycles) are not checked here; those fail
    /// the build itself rather than the submission.
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(Error::InvalidConfig(
                "build configuration has no tasks".to_string(),
            ));
        }
        for (index, task) in self.tasks.iter().enumerate() {
            if task.id.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("task #{} has an empty id", index)));
            }
            if task.command.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "task '{}' has an empty command",
                    task.id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded,
    Failed,
}

/// Result of executing one task. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub outcome: TaskOutcome,
    pub combined_output: String,
    pub duration_millis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_error: Option<String>,
}

impl TaskResult {
    /// Result for a process that ran to completion.
    pub fn exited(
        task_id: impl Into<String>,
        exit_code: i32,
        combined_output: String,
        duration_millis: u64,
    ) -> Self {
        let outcome = if exit_code == 0 {
            TaskOutcome::Succeeded
        } else {
            TaskOutcome::Failed
        };
        Self {
            task_id: task_id.into(),
            outcome,
            combined_output,
            duration_millis,
            exit_code: (exit_code != 0).then_some(exit_code),
            spawn_error: None,
        }
    }

    /// Result for a process that could not be started at all.
    pub fn spawn_failed(
        task_id: impl Into<String>,
        message: impl Into<String>,
        duration_millis: u64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            outcome: TaskOutcome::Failed,
            combined_output: String::new(),
            duration_millis,
            exit_code: None,
            spawn_error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == TaskOutcome::Succeeded
    }

    /// Short human-readable reason for a failed result.
    pub fn failure_reason(&self) -> Option<String> {
        match (&self.outcome, self.exit_code, &self.spawn_error) {
            (TaskOutcome::Succeeded, _, _) => None,
            (TaskOutcome::Failed, _, Some(err)) => Some(format!("failed to start: {}", err)),
            (TaskOutcome::Failed, Some(code), None) => Some(format!("exit code {}", code)),
            (TaskOutcome::Failed, None, None) => Some("failed".to_string()),
        }
    }
}
