//! CLI command definitions.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Address to bind (overrides configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a pipeline file locally
    Run {
        /// Path to pipeline file (JSON or YAML)
        #[arg(default_value = "kiln.yaml")]
        file: PathBuf,

        /// Maximum tasks running at once within a layer
        #[arg(short = 'j', long)]
        max_parallel: Option<usize>,

        /// Include task output in the build log
        #[arg(long)]
        stream_output: bool,

        /// Last known commit; changed files are reported relative to it
        #[arg(long)]
        since: Option<String>,

        /// Working directory for tasks that do not set one
        #[arg(short = 'C', long)]
        workspace: Option<PathBuf>,
    },

    /// Validate a pipeline file and print its execution layers
    Plan {
        /// Path to pipeline file (JSON or YAML)
        #[arg(default_value = "kiln.yaml")]
        file: PathBuf,

        /// Print the layers as JSON
        #[arg(long)]
        json: bool,
    },
}
