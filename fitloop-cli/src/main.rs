//! fitloop CLI — replay, resume and inspect training-run progress.

mod commands;

use clap::Parser;
use fitloop_core::config::LoggingConfig;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// fitloop: progress bookkeeping for training runs
#[derive(Parser, Debug)]
#[command(name = "fitloop", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Replay a fresh fit run and write its progress snapshot
    Run {
        /// Number of epochs (overrides config)
        #[arg(long)]
        epochs: Option<u64>,
        /// Training batches per epoch (overrides config)
        #[arg(long)]
        train_batches: Option<u64>,
        /// Validation batches per epoch (overrides config)
        #[arg(long)]
        val_batches: Option<u64>,
        /// Snapshot path (overrides config)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Continue a saved run up to a new epoch count
    Resume {
        /// Snapshot path (overrides config)
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Epoch count to reach, counted across resumes
        #[arg(long)]
        epochs: Option<u64>,
    },
    /// Print the counters of a snapshot
    Inspect {
        /// Snapshot file
        path: PathBuf,
        /// Print raw JSON instead of tracker summaries
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = fitloop_core::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let _guard = init_logging(&config.logging, cli.verbose, cli.quiet);
    tracing::debug!(workspace = %workspace.display(), "starting fitloop");

    commands::handle_command(cli.command, &workspace, &config)
}

/// Human-readable stderr logging, plus daily JSON files when `log_dir` is set.
fn init_logging(logging: &LoggingConfig, verbose: u8, quiet: bool) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 if quiet => EnvFilter::new("error"),
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let (json_layer, guard) = match logging.log_dir.as_ref() {
        Some(log_dir) => {
            let _ = std::fs::create_dir_all(log_dir);
            let file_appender = tracing_appender::rolling::daily(log_dir, "fitloop.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}
