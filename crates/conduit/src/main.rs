//! Conduit - sequential workflow runner
//!
//! Main entry point for the `conduit` CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use console::style;
use tracing_appender::non_blocking::WorkerGuard;

use conduit_config::LoggingConfig;

mod commands;

use commands::{run, validate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Conduit - run workflows of external actions
#[derive(Parser)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the user config file (config.toml)
    #[arg(long, global = true, env = "CONDUIT_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow file
    Run(run::RunArgs),

    /// Check a workflow file without running it
    Validate(validate::ValidateArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

const DEFAULT_FILTER: &str = "conduit=info,conduit_pipeline=info,warn";
const VERBOSE_FILTER: &str = "conduit=debug,conduit_pipeline=debug,conduit_config=debug,info";
const FILE_FILTER: &str = "conduit=trace,conduit_pipeline=trace,conduit_config=trace,info";

/// Install the stderr layer and, when configured, a daily JSON file layer.
///
/// `RUST_LOG` wins over `--verbose`, which wins over `logging.level`.
fn init_tracing(verbose: bool, logging: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(VERBOSE_FILTER)
        } else {
            EnvFilter::new(logging.level.as_deref().unwrap_or(DEFAULT_FILTER))
        }
    });

    let (file_layer, guard) = match &logging.file_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "conduit.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let loaded = conduit_config::load_config_with_options(None, cli.config_dir.as_deref())
        .context("failed to load configuration")?;

    let _guard = init_tracing(cli.verbose, &loaded.config.logging());
    for path in loaded.loaded_from() {
        tracing::debug!(path = %path.display(), "Loaded config file");
    }

    let ctx = commands::Context {
        config: loaded.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Validate(args) => validate::run(args, &ctx),
    }
}
