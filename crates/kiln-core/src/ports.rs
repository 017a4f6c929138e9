//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the orchestration engine and
//! its external collaborators.

use crate::Result;
use crate::build::Build;
use crate::events::Event;
use crate::ids::BuildId;
use async_trait::async_trait;

/// Persistence for build records.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Persist a freshly allocated build.
    async fn create(&self, build: &Build) -> Result<Build>;

    /// Overwrite the stored snapshot of a build.
    async fn save(&self, build: &Build) -> Result<()>;

    /// Get a build by ID.
    async fn get(&self, id: BuildId) -> Result<Option<Build>>;

    /// List builds, most recent `start_time` first.
    async fn list(&self, limit: u32) -> Result<Vec<Build>>;

    /// Check if the backend is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Best-effort broadcast of build events to observers.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> Result<()>;
}

/// Advisory source of "what changed" information.
#[async_trait]
pub trait ChangeDetector: Send + Sync {
    /// Files changed since `last_known_ref` (or in the working tree when no
    /// ref is known). `None` means unknown, which callers treat as a full
    /// rebuild.
    async fn changed_files_since(&self, last_known_ref: Option<&str>) -> Option<Vec<String>>;
}
