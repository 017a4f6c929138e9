//! Command handlers.

use crate::config::ServerConfig;
use crate::pipeline;

use anyhow::Context;
use kiln_api::{AppState, create_router};
use kiln_core::build::{BuildStatus, TriggerKind};
use kiln_core::events::Event;
use kiln_core::ports::{BuildStore, EventSink};
use kiln_db::{Database, FallbackBuildStore, MemoryBuildStore, PgBuildStore};
use kiln_events::{BroadcastEventSink, FanoutEventSink, NatsEventSink};
use kiln_runner::{GitChangeDetector, RunnerConfig, ShellRunner};
use kiln_scheduler::{DagBuilder, Orchestrator, OrchestratorConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};

/// Start the API server and run until interrupted.
pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let store = build_store(config).await?;

    let broadcast = BroadcastEventSink::new();
    let mut events = FanoutEventSink::new().with_sink(Arc::new(broadcast.clone()));
    let mut nats = None;
    if let Some(url) = &config.nats_url {
        match NatsEventSink::connect(url).await {
            Ok(sink) => {
                events = events.with_sink(Arc::new(sink.clone()));
                nats = Some(sink);
            }
            Err(e) => warn!(error = %e, "NATS unavailable, events stay in-process"),
        }
    }

    let workspace = std::env::current_dir().context("Failed to determine working directory")?;
    let orchestrator = Orchestrator::new(
        store,
        Arc::new(events),
        Arc::new(GitChangeDetector::new(&workspace)),
        Arc::new(ShellRunner::new(RunnerConfig::default().with_workspace(&workspace))),
        orchestrator_config(
            config.max_parallel_tasks,
            config.stream_task_output,
            config.baseline_ref.clone(),
        ),
    );

    let state = AppState::new(orchestrator, broadcast).with_list_limit(config.list_limit);
    let router = create_router(Arc::new(state));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("kiln listening on {}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(nats) = nats {
        if let Err(e) = nats.shutdown().await {
            warn!(error = %e, "Failed to drain NATS connection");
        }
    }

    info!("kiln stopped");
    Ok(())
}

async fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn BuildStore>> {
    let Some(url) = &config.database_url else {
        info!("No database configured, builds are kept in memory");
        return Ok(Arc::new(FallbackBuildStore::memory_only()));
    };

    let db = Database::connect_lazy(url)?;
    if let Err(e) = db.migrate().await {
        warn!(error = %e, "Could not run migrations, will fall back to memory while the database is unreachable");
    }

    let durable = Arc::new(PgBuildStore::new(db.pool().clone()));
    Ok(Arc::new(
        FallbackBuildStore::new(durable)
            .with_check_interval(Duration::from_millis(config.store_check_interval_ms))
            .with_check_timeout(Duration::from_millis(config.store_check_timeout_ms)),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn orchestrator_config(
    max_parallel: Option<usize>,
    stream_output: bool,
    baseline_ref: Option<String>,
) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default().with_stream_task_output(stream_output);
    if let Some(max) = max_parallel {
        config = config.with_max_parallel_tasks(max);
    }
    if let Some(git_ref) = baseline_ref {
        config = config.with_baseline_ref(git_ref);
    }
    config
}

/// Run a pipeline file to completion, printing the build log as it grows.
pub async fn run(
    file: &Path,
    max_parallel: Option<usize>,
    stream_output: bool,
    baseline_ref: Option<String>,
    workspace: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let config = pipeline::load(file)?;

    let workspace = match workspace {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine working directory")?,
    };

    let broadcast = BroadcastEventSink::new();
    let mut events = broadcast.subscribe();
    let sink: Arc<dyn EventSink> = Arc::new(broadcast);

    let orchestrator = Orchestrator::new(
        Arc::new(MemoryBuildStore::new()),
        sink,
        Arc::new(GitChangeDetector::new(&workspace)),
        Arc::new(ShellRunner::new(RunnerConfig::default().with_workspace(&workspace))),
        orchestrator_config(max_parallel, stream_output, baseline_ref),
    );

    let handle = orchestrator.trigger_build(config, TriggerKind::Manual).await?;
    let build_id = handle.id();
    let completion = handle.wait();
    tokio::pin!(completion);

    let build = loop {
        tokio::select! {
            biased;
            event = events.recv() => {
                if let Ok(Event::Log(log)) = event {
                    if log.build_id == build_id {
                        println!("{}", log.message);
                    }
                }
            }
            finished = &mut completion => {
                // Print whatever was published before the driver returned.
                loop {
                    match events.try_recv() {
                        Ok(Event::Log(log)) if log.build_id == build_id => println!("{}", log.message),
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                    }
                }
                break finished?;
            }
        }
    };

    let duration = build
        .duration_ms()
        .map(|ms| format!(" in {}ms", ms))
        .unwrap_or_default();
    println!("Build {} finished: {}{}", build.id, build.status, duration);

    Ok(match build.status {
        BuildStatus::Success => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Validate a pipeline file and print its layers.
pub fn plan(file: &Path, json: bool) -> anyhow::Result<()> {
    let config = pipeline::load(file)?;
    let plan = DagBuilder::new()
        .plan(&config.tasks)
        .with_context(|| format!("Invalid task graph in {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "{} tasks in {} layers",
        plan.task_count(),
        plan.len()
    );
    for (index, layer) in plan.layers().iter().enumerate() {
        println!("  [Layer {}] {}", index + 1, layer.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_config_carries_overrides() {
        let config = orchestrator_config(Some(0), true, Some("origin/main".to_string()));
        assert_eq!(config.max_parallel_tasks, Some(1));
        assert!(config.stream_task_output);
        assert_eq!(config.baseline_ref.as_deref(), Some("origin/main"));

        let config = orchestrator_config(None, false, None);
        assert_eq!(config.max_parallel_tasks, None);
        assert!(config.baseline_ref.is_none());
    }
}
