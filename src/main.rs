//! `eeprobe` CLI - Measure live stream latency and stability

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "eeprobe")]
#[command(about = "Tests the fetching of Eagle Eye live streams")]
#[command(version)]
struct Cli {
    /// The JSON configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Print per-request details while executing
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure time to first byte for every configured camera
    Latency {
        /// Number of trials per camera
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        trials: u32,
    },

    /// Read one camera's live stream until interrupted
    Stream {
        /// Camera name from the configuration file
        camera: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; results go to stdout, diagnostics to stderr
    let default_level = if cli.verbose { "eeprobe=debug" } else { "eeprobe=info" };
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = cmd::load_config(&cli.config)?;

    match cli.command {
        Commands::Latency { trials } => {
            cmd::cmd_latency(&config, trials).await?;
        }
        Commands::Stream { camera } => {
            cmd::cmd_stream(&config, &camera).await?;
        }
    }

    Ok(())
}
