//! Progress reporting for a download run.
//!
//! The orchestrator calls these hooks; the CLI prints them, tests record them.

use candlestash_core::domain::{Pair, Timeframe};

use crate::config::RunConfig;
use crate::orchestrator::{PairOutcome, PairReport, RunSummary};

/// Callback for run progress.
pub trait RunProgress: Send + Sync {
    /// Called once before the first unit, with the number of units planned.
    fn on_plan(&self, config: &RunConfig, total: usize);

    /// Called when starting to fetch a unit.
    fn on_pair_start(&self, pair: &Pair, timeframe: Timeframe, index: usize, total: usize);

    /// Called when a unit has been fetched and, if it had data, written.
    fn on_pair_complete(&self, report: &PairReport, index: usize, total: usize);

    /// Called when the run is over, interrupted or not.
    fn on_batch_complete(&self, summary: &RunSummary);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl RunProgress for StdoutProgress {
    fn on_plan(&self, config: &RunConfig, total: usize) {
        let symbols: Vec<String> = config.symbols.iter().map(|s| s.pair.to_string()).collect();
        let timeframes: Vec<&str> = config.timeframes.iter().map(|tf| tf.label()).collect();
        println!("Starting data fetch from {}", config.exchange);
        println!("Symbols: {}", symbols.join(", "));
        println!("Timeframes: {}", timeframes.join(", "));
        println!("Output: {} ({total} downloads)\n", config.output_dir.display());
    }

    fn on_pair_start(&self, pair: &Pair, timeframe: Timeframe, index: usize, total: usize) {
        println!("[{}/{}] Fetching {pair} {timeframe}...", index + 1, total);
    }

    fn on_pair_complete(&self, report: &PairReport, _index: usize, _total: usize) {
        match &report.outcome {
            PairOutcome::Saved(record) => println!(
                "  OK ({} candles) -> {}",
                record.row_count,
                record.path.display()
            ),
            PairOutcome::NoData => println!("  no data"),
            PairOutcome::FetchFailed(e) => println!("  FAILED: {e}"),
            PairOutcome::WriteFailed(e) => println!("  FAILED to save: {e}"),
        }
    }

    fn on_batch_complete(&self, summary: &RunSummary) {
        println!(
            "\nDownload complete: {}/{} succeeded, {} failed",
            summary.succeeded(),
            summary.planned,
            summary.failed()
        );
        if summary.interrupted {
            println!(
                "Stopped early: {} of {} downloads attempted",
                summary.reports.len(),
                summary.planned
            );
        }

        let files = summary.saved_files();
        if !files.is_empty() {
            println!("Saved files:");
            for path in files {
                let name = path.file_name().unwrap_or(path.as_os_str());
                println!("  {}", name.to_string_lossy());
            }
        }
    }
}

/// Progress reporter that does nothing.
pub struct NullProgress;

impl RunProgress for NullProgress {
    fn on_plan(&self, _config: &RunConfig, _total: usize) {}
    fn on_pair_start(&self, _pair: &Pair, _timeframe: Timeframe, _index: usize, _total: usize) {}
    fn on_pair_complete(&self, _report: &PairReport, _index: usize, _total: usize) {}
    fn on_batch_complete(&self, _summary: &RunSummary) {}
}
