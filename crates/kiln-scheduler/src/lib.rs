//! Dependency planning and build orchestration for kiln.

pub mod config;
pub mod dag;
pub mod orchestrator;
mod session;

pub use config::OrchestratorConfig;
pub use dag::{DagBuilder, DagError, ExecutionPlan, TaskGraph};
pub use orchestrator::{BuildHandle, Orchestrator};
