//! Candlestash CLI: download configured OHLCV histories to CSV.
//!
//! Commands:
//! - `run`: fetch every configured (pair, timeframe) and save one file each
//!   (also the default when no command is given)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use candlestash_core::data::SeriesWriter;
use candlestash_core::exchange::{self, ClientOptions};
use candlestash_core::Interrupt;
use candlestash_runner::{run_downloads, RunConfig, StdoutProgress};

/// Looked up in the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "candlestash.toml";

#[derive(Parser)]
#[command(
    name = "candlestash",
    version,
    about = "Candlestash: historical crypto candle downloader"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every configured pair and timeframe.
    Run {
        /// Path to a TOML config file. Defaults to ./candlestash.toml, then built-in settings.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run { config: None }) {
        Commands::Run { config } => run_cmd(config),
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<RunConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => PathBuf::from(DEFAULT_CONFIG_FILE),
        None => {
            info!("no config file given; using built-in settings");
            return Ok(RunConfig::default());
        }
    };
    info!(path = %path.display(), "loading config");
    RunConfig::from_file(&path).with_context(|| format!("load config {}", path.display()))
}

/// First Ctrl-C asks the run to stop; a second one exits on the spot.
fn install_interrupt_handler(interrupt: &Interrupt) -> Result<()> {
    let handler_side = interrupt.clone();
    ctrlc::set_handler(move || {
        if handler_side.is_triggered() {
            println!("\nProcess stopped by user");
            std::process::exit(0);
        }
        handler_side.trigger();
        warn!("interrupt received; stopping the current download (Ctrl-C again to quit now)");
    })
    .context("install Ctrl-C handler")
}

fn run_cmd(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let interrupt = Interrupt::new();
    install_interrupt_handler(&interrupt)?;

    let options = ClientOptions {
        interrupt: interrupt.clone(),
        ..config.client_options()
    };
    let client = exchange::connect(&config.exchange, &options)
        .with_context(|| format!("connect to exchange '{}'", config.exchange))?;
    let writer = SeriesWriter::new(
        config.output_dir.clone(),
        config.filename_timestamp_format.clone(),
    )
    .with_context(|| format!("prepare output directory {}", config.output_dir.display()))?;

    let summary = run_downloads(
        &config,
        client.as_ref(),
        &writer,
        &StdoutProgress,
        &interrupt,
    );

    if summary.interrupted {
        println!("\nProcess stopped by user");
    }
    Ok(())
}
