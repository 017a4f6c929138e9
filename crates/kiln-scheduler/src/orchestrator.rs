//! Build orchestration.
//!
//! A triggered build is driven on its own tokio task. Layers run strictly
//! one after another; the tasks of one layer run concurrently and the layer
//! is only evaluated once every one of them has finished.

use crate::config::OrchestratorConfig;
use crate::dag::{DagBuilder, DagError, ExecutionPlan, TaskGraph};
use crate::session::BuildSession;

use futures::FutureExt;
use kiln_core::build::{Build, BuildStatus, TriggerKind};
use kiln_core::events::Event;
use kiln_core::ids::BuildId;
use kiln_core::ports::{BuildStore, ChangeDetector, EventSink};
use kiln_core::task::{BuildConfig, Task, TaskResult};
use kiln_core::{Error, Result};
use kiln_runner::{OutputLine, TaskRunner};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// The orchestration engine.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn BuildStore>,
    events: Arc<dyn EventSink>,
    changes: Arc<dyn ChangeDetector>,
    runner: Arc<dyn TaskRunner>,
    dag_builder: DagBuilder,
    config: Arc<OrchestratorConfig>,
}

/// A triggered build.
///
/// Dropping the handle detaches from the run; it keeps going in the
/// background.
pub struct BuildHandle {
    build: Build,
    completion: JoinHandle<Build>,
}

impl BuildHandle {
    /// Snapshot taken when the build was allocated (status `pending`).
    pub fn build(&self) -> &Build {
        &self.build
    }

    pub fn id(&self) -> BuildId {
        self.build.id
    }

    /// Wait for the build to reach a terminal status.
    pub async fn wait(self) -> Result<Build> {
        self.completion
            .await
            .map_err(|e| Error::Internal(format!("build driver did not complete: {}", e)))
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn BuildStore>,
        events: Arc<dyn EventSink>,
        changes: Arc<dyn ChangeDetector>,
        runner: Arc<dyn TaskRunner>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            events,
            changes,
            runner,
            dag_builder: DagBuilder::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate a submission, allocate a build and start running it.
    ///
    /// Returns as soon as the build is recorded; execution continues in the
    /// background. Only malformed submissions are reported here.
    pub async fn trigger_build(&self, config: BuildConfig, trigger: TriggerKind) -> Result<BuildHandle> {
        config.validate()?;

        let triggered_by = config
            .triggered_by
            .clone()
            .unwrap_or_else(|| self.config.default_triggered_by.clone());
        let build = Build::new(trigger, triggered_by);

        info!(
            build_id = %build.id,
            trigger = %trigger,
            tasks = config.tasks.len(),
            "Triggering build"
        );

        if let Err(e) = self.store.create(&build).await {
            warn!(build_id = %build.id, error = %e, "Failed to persist new build");
        }
        if let Err(e) = self.events.publish(Event::BuildStart(build.clone())).await {
            warn!(build_id = %build.id, error = %e, "Failed to publish build start");
        }

        let session = BuildSession::new(build.clone(), self.store.clone(), self.events.clone());
        let completion = tokio::spawn(self.clone().supervise(session, config));

        Ok(BuildHandle { build, completion })
    }

    /// Get a build by ID.
    pub async fn get_build(&self, id: BuildId) -> Result<Option<Build>> {
        self.store.get(id).await
    }

    /// List builds, most recent first.
    pub async fn list_builds(&self, limit: u32) -> Result<Vec<Build>> {
        self.store.list(limit).await
    }

    /// Check that the build store can serve requests.
    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }

    /// Validate a task set and compute its layers without running anything.
    pub fn plan(&self, config: &BuildConfig) -> Result<ExecutionPlan> {
        config.validate()?;
        self.dag_builder
            .plan(&config.tasks)
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Run the driver and make sure the build ends terminal whatever happens.
    async fn supervise(self, session: BuildSession, config: BuildConfig) -> Build {
        let outcome = AssertUnwindSafe(self.run_build(&session, &config))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => session.fail_critically(&e.to_string()).await,
            Err(panic) => session.fail_critically(&panic_message(panic.as_ref())).await,
        }

        let build = session.snapshot().await;
        if build.is_terminal() {
            return build;
        }

        session
            .fail_critically("build driver stopped before the build finished")
            .await;
        session.snapshot().await
    }

    async fn run_build(&self, session: &BuildSession, config: &BuildConfig) -> Result<()> {
        session.transition(BuildStatus::Running).await?;
        session.log("Build pipeline started").await?;

        let changed = self
            .changes
            .changed_files_since(self.config.baseline_ref.as_deref())
            .await;
        session.log(describe_changes(changed.as_deref())).await?;

        let (graph, plan) = match self.resolve(&config.tasks) {
            Ok(resolved) => resolved,
            Err(reason) => {
                warn!(build_id = %session.id(), error = %reason, "Invalid task graph");
                session.log(format!("Build failed: {}", reason)).await?;
                session.transition(BuildStatus::Failed).await?;
                return Ok(());
            }
        };

        session.log(format!("Execution plan (layers): {}", plan)).await?;

        for (index, layer) in plan.layers().iter().enumerate() {
            session
                .log(format!(
                    "[Layer {}] Starting parallel execution: {}",
                    index + 1,
                    layer.join(", ")
                ))
                .await?;

            let tasks = layer
                .iter()
                .map(|id| {
                    graph
                        .task(id)
                        .cloned()
                        .ok_or_else(|| Error::Internal(format!("planned task '{}' is missing", id)))
                })
                .collect::<Result<Vec<_>>>()?;

            let results = self.run_layer(session, tasks).await?;

            let mut failed = Vec::new();
            for result in &results {
                if result.is_success() {
                    session
                        .log(format!(
                            "Task '{}' completed in {}ms.",
                            result.task_id, result.duration_millis
                        ))
                        .await?;
                } else {
                    failed.push(result.task_id.as_str());
                    let reason = result
                        .failure_reason()
                        .unwrap_or_else(|| "failed".to_string());
                    session
                        .log(format!("Task '{}' failed: {}", result.task_id, reason))
                        .await?;
                }
            }

            if !failed.is_empty() {
                session
                    .log(format!(
                        "Build failed: execution stopped. Failed tasks: {}",
                        failed.join(", ")
                    ))
                    .await?;
                session.transition(BuildStatus::Failed).await?;
                return Ok(());
            }

            session.checkpoint().await;
        }

        session.log("Build completed successfully.").await?;
        session.transition(BuildStatus::Success).await?;
        Ok(())
    }

    fn resolve(&self, tasks: &[Task]) -> std::result::Result<(TaskGraph, ExecutionPlan), DagError> {
        let graph = self.dag_builder.build(tasks)?;
        let plan = graph.layers()?;
        Ok((graph, plan))
    }

    /// Run one layer to completion. Results come back in layer order.
    async fn run_layer(&self, session: &BuildSession, tasks: Vec<Task>) -> Result<Vec<TaskResult>> {
        let build_id = session.id();

        let (output_tx, forwarder) = if self.config.stream_task_output {
            let (tx, rx) = mpsc::channel::<OutputLine>(256);
            let forwarder = tokio::spawn(forward_output(session.clone(), rx));
            (Some(tx), Some(forwarder))
        } else {
            (None, None)
        };

        let semaphore = self
            .config
            .max_parallel_tasks
            .map(|max| Arc::new(Semaphore::new(max.max(1))));

        let mut set = JoinSet::new();
        let mut slots = HashMap::with_capacity(tasks.len());

        for (slot, task) in tasks.iter().enumerate() {
            let runner = self.runner.clone();
            let task = task.clone();
            let output_tx = output_tx.clone();
            let semaphore = semaphore.clone();

            let handle = set.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                runner.run(&task, build_id, output_tx).await
            });
            slots.insert(handle.id(), slot);
        }
        drop(output_tx);

        let mut results: Vec<Option<TaskResult>> = vec![None; tasks.len()];
        let mut fault = None;

        // Siblings always run to completion, even after a fault.
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    if let Some(&slot) = slots.get(&id) {
                        debug!(build_id = %build_id, task = %result.task_id, "Task finished");
                        results[slot] = Some(result);
                    }
                }
                Err(e) => {
                    let task_id = slots
                        .get(&e.id())
                        .map(|&slot| tasks[slot].id.as_str())
                        .unwrap_or("unknown");
                    error!(build_id = %build_id, task = %task_id, error = %e, "Task runner aborted");
                    fault.get_or_insert_with(|| format!("task '{}' aborted: {}", task_id, e));
                }
            }
        }

        if let Some(forwarder) = forwarder {
            if let Err(e) = forwarder.await {
                warn!(build_id = %build_id, error = %e, "Output forwarder stopped");
            }
        }

        if let Some(fault) = fault {
            return Err(Error::Internal(fault));
        }

        Ok(results.into_iter().flatten().collect())
    }
}

async fn forward_output(session: BuildSession, mut rx: mpsc::Receiver<OutputLine>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = session
            .log(format!("[{}] {}", line.task_id, line.content))
            .await
        {
            warn!(build_id = %session.id(), error = %e, "Dropped task output line");
        }
    }
}

fn describe_changes(changed: Option<&[String]>) -> String {
    match changed {
        None => "Changed files: ALL (full rebuild)".to_string(),
        Some([]) => "Changed files: none".to_string(),
        Some(files) => format!("Changed files: {}", files.join(", ")),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "build driver panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_changes() {
        assert_eq!(describe_changes(None), "Changed files: ALL (full rebuild)");
        assert_eq!(describe_changes(Some(&[])), "Changed files: none");
        assert_eq!(
            describe_changes(Some(&["a.rs".to_string(), "b.rs".to_string()])),
            "Changed files: a.rs, b.rs"
        );
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "build driver panicked");
    }
}
