//! Orchestration engine configuration.

/// Configuration for the orchestration engine.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Ceiling on tasks running at once within a layer. `None` runs every
    /// task of a layer at once.
    pub max_parallel_tasks: Option<usize>,
    /// Append task output lines to the build log as they arrive.
    pub stream_task_output: bool,
    /// Last known commit handed to the change detector.
    pub baseline_ref: Option<String>,
    /// `triggeredBy` for submissions that do not name one.
    pub default_triggered_by: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: None,
            stream_task_output: false,
            baseline_ref: None,
            default_triggered_by: "user".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Bound per-layer concurrency. Zero is treated as one.
    pub fn with_max_parallel_tasks(mut self, max: usize) -> Self {
        self.max_parallel_tasks = Some(max.max(1));
        self
    }

    pub fn with_stream_task_output(mut self, enable: bool) -> Self {
        self.stream_task_output = enable;
        self
    }

    pub fn with_baseline_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.baseline_ref = Some(git_ref.into());
        self
    }
}
