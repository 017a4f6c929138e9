//! Build records and the build status state machine.

use crate::ids::BuildId;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One end-to-end run of a task set.
///
/// Wire shape: `{ id, status, trigger, startTime, endTime?, logs, triggeredBy }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: BuildId,
    pub status: BuildStatus,
    pub trigger: TriggerKind,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logs: Vec<String>,
    pub triggered_by: String,
}

impl Build {
    /// Allocate a new build in `pending`.
    pub fn new(trigger: TriggerKind, triggered_by: impl Into<String>) -> Self {
        Self {
            id: BuildId::new(),
            status: BuildStatus::Pending,
            trigger,
            start_time: Utc::now(),
            end_time: None,
            logs: Vec::new(),
            triggered_by: triggered_by.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, stamping `end_time` on a terminal transition.
    pub fn transition(&mut self, next: BuildStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.end_time = Some(Utc::now());
        }
        Ok(())
    }

    /// Append a log line. Terminal builds are immutable.
    pub fn push_log(&mut self, message: impl Into<String>) -> Result<()> {
        if self.is_terminal() {
            return Err(Error::Internal(format!(
                "build {} is {} and no longer accepts log lines",
                self.id, self.status
            )));
        }
        self.logs.push(message.into());
        Ok(())
    }

    /// Duration from start to end, if the build has finished.
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0) as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStatus::Success | BuildStatus::Failed)
    }

    /// Statuses only move forward: pending -> running -> success | failed,
    /// or pending -> failed.
    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        matches!(
            (self, next),
            (BuildStatus::Pending, BuildStatus::Running)
                | (BuildStatus::Pending, BuildStatus::Failed)
                | (BuildStatus::Running, BuildStatus::Success)
                | (BuildStatus::Running, BuildStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Running => "running",
            BuildStatus::Success => "success",
            BuildStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(BuildStatus::Pending),
            "running" => Ok(BuildStatus::Running),
            "success" => Ok(BuildStatus::Success),
            "failed" => Ok(BuildStatus::Failed),
            other => Err(Error::Serialization(format!("unknown build status: {}", other))),
        }
    }
}

/// Originating cause of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    Manual,
    Webhook,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Manual => "manual",
            TriggerKind::Webhook => "webhook",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(TriggerKind::Manual),
            "webhook" => Ok(TriggerKind::Webhook),
            other => Err(Error::Serialization(format!("unknown trigger: {}", other))),
        }
    }
}
