//! kiln CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;
mod handlers;
mod pipeline;
mod telemetry;

use commands::Commands;
use config::ServerConfig;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "kiln build pipeline orchestrator", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./kiln-server.yaml or ./kiln-server.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref())?;
    telemetry::init_tracing(config.log_format);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            handlers::serve(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            file,
            max_parallel,
            stream_output,
            since,
            workspace,
        } => {
            handlers::run(
                &file,
                max_parallel.or(config.max_parallel_tasks),
                stream_output || config.stream_task_output,
                since.or(config.baseline_ref),
                workspace,
            )
            .await
        }
        Commands::Plan { file, json } => {
            handlers::plan(&file, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
