//! Shell-based task execution on the host.

use crate::runner::{OutputLine, OutputStream, RunnerConfig, TaskRunner};
use async_trait::async_trait;
use kiln_core::ids::BuildId;
use kiln_core::task::{Task, TaskResult};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shell runner for executing task commands on the host.
pub struct ShellRunner {
    config: RunnerConfig,
}

impl ShellRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn command(&self, script: &str) -> Command {
        let mut command = match self.config.shell.as_deref() {
            Some(shell) => {
                let mut c = Command::new(shell);
                c.arg("-c");
                c
            }
            None if cfg!(windows) => {
                let mut c = Command::new("cmd");
                c.arg("/C");
                c
            }
            None => {
                let mut c = Command::new("sh");
                c.arg("-c");
                c
            }
        };
        command.arg(script);
        command
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

#[async_trait]
impl TaskRunner for ShellRunner {
    async fn run(
        &self,
        task: &Task,
        build_id: BuildId,
        output_tx: Option<mpsc::Sender<OutputLine>>,
    ) -> TaskResult {
        let start = Instant::now();
        let workspace = task
            .working_directory
            .clone()
            .unwrap_or_else(|| self.config.workspace.clone());

        info!(
            build_id = %build_id,
            task = %task.id,
            command = %task.command,
            workspace = %workspace.display(),
            "Starting task"
        );

        let spawned = self
            .command(&task.command)
            .current_dir(&workspace)
            .envs(&self.config.env)
            .env("KILN_BUILD_ID", build_id.to_string())
            .env("KILN_TASK_ID", &task.id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!(build_id = %build_id, task = %task.id, error = %e, "Task failed to spawn");
                return TaskResult::spawn_failed(&task.id, e.to_string(), elapsed_ms(start));
            }
        };

        // Both pipes feed one channel so the combined output keeps arrival order.
        let (line_tx, mut line_rx) = mpsc::channel::<OutputLine>(256);
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(
                stdout,
                OutputStream::Stdout,
                task.id.clone(),
                line_tx.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(
                stderr,
                OutputStream::Stderr,
                task.id.clone(),
                line_tx.clone(),
            )));
        }
        drop(line_tx);

        let mut combined_output = String::new();
        let collect = async {
            while let Some(line) = line_rx.recv().await {
                debug!(task = %line.task_id, stream = ?line.stream, "{}", line.content);
                combined_output.push_str(&line.content);
                combined_output.push('\n');
                if let Some(tx) = &output_tx {
                    // Observers going away must not stall the task.
                    let _ = tx.send(line).await;
                }
            }
        };

        let (wait_result, ()) = tokio::join!(child.wait(), collect);

        for pump in pumps {
            let _ = pump.await;
        }

        let duration_ms = elapsed_ms(start);

        match wait_result {
            Ok(status) => {
                let exit_code = status.code().unwrap_or(-1);
                if exit_code == 0 {
                    info!(build_id = %build_id, task = %task.id, duration_ms, "Task completed");
                } else {
                    warn!(build_id = %build_id, task = %task.id, exit_code, duration_ms, "Task failed");
                }
                TaskResult::exited(&task.id, exit_code, combined_output, duration_ms)
            }
            Err(e) => {
                error!(build_id = %build_id, task = %task.id, error = %e, "Failed to wait for task process");
                let mut result = TaskResult::spawn_failed(
                    &task.id,
                    format!("failed to wait for process: {}", e),
                    duration_ms,
                );
                result.combined_output = combined_output;
                result
            }
        }
    }
}

async fn pump<R>(reader: R, stream: OutputStream, task_id: String, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut line_number = 0u32;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                line_number += 1;
                let content = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                let line = OutputLine {
                    task_id: task_id.clone(),
                    stream,
                    content,
                    line_number,
                    timestamp: chrono::Utc::now(),
                };
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(task = %task_id, stream = ?stream, error = %e, "Failed to read task output");
                break;
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
