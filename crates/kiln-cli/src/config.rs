//! Server configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional
//! `kiln-server.yaml` / `kiln-server.toml` (or the file passed with
//! `--config`), then `KILN_*` environment variables. A `.env` file is loaded
//! into the environment before any of this runs.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// PostgreSQL URL. Without one builds are kept in memory only.
    pub database_url: Option<String>,
    /// NATS URL. Without one events only reach WebSocket observers.
    pub nats_url: Option<String>,
    pub max_parallel_tasks: Option<usize>,
    pub stream_task_output: bool,
    /// Last known commit; changed files are reported relative to it.
    pub baseline_ref: Option<String>,
    /// How long a database reachability check is trusted.
    pub store_check_interval_ms: u64,
    /// Upper bound on one database reachability check.
    pub store_check_timeout_ms: u64,
    pub log_format: LogFormat,
    pub list_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            nats_url: None,
            max_parallel_tasks: None,
            stream_task_output: false,
            baseline_ref: None,
            store_check_interval_ms: 2000,
            store_check_timeout_ms: 500,
            log_format: LogFormat::Pretty,
            list_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl ServerConfig {
    /// Load configuration from files and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = match file {
            Some(path) => builder.add_source(config::File::from(path)),
            None => {
                builder.add_source(config::File::with_name("kiln-server").required(false))
            }
        };

        builder
            .add_source(config::Environment::with_prefix("KILN").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
