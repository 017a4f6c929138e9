//! Events broadcast to build observers.

use crate::build::Build;
use crate::ids::BuildId;
use serde::{Deserialize, Serialize};

/// All events emitted by the orchestration engine.
///
/// Serialized as `{"event": "<name>", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum Event {
    BuildStart(Build),
    BuildUpdate(Build),
    Log(LogPayload),
}

impl Event {
    /// Event name as seen by observers.
    pub fn name(&self) -> &'static str {
        match self {
            Event::BuildStart(_) => "build-start",
            Event::BuildUpdate(_) => "build-update",
            Event::Log(_) => "log",
        }
    }

    /// Build this event belongs to.
    pub fn build_id(&self) -> BuildId {
        match self {
            Event::BuildStart(b) | Event::BuildUpdate(b) => b.id,
            Event::Log(p) => p.build_id,
        }
    }

    /// Message subject for subject-routed transports.
    pub fn subject(&self) -> String {
        match self {
            Event::BuildStart(_) => "build.start".to_string(),
            Event::BuildUpdate(b) => format!("build.update.{}", b.id.as_uuid()),
            Event::Log(p) => format!("log.{}", p.build_id.as_uuid()),
        }
    }

    pub fn log(build_id: BuildId, message: impl Into<String>) -> Self {
        Event::Log(LogPayload {
            build_id,
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPayload {
    pub build_id: BuildId,
    pub message: String,
}
