//! Run orchestrator: fetch then write every configured (pair, timeframe), in order.
//!
//! A failing pair is recorded and the run moves on; only an interrupt stops the
//! loop early.

use std::path::Path;

use candlestash_core::data::fetcher::{FetchError, FetchRequest, HistoricalFetcher};
use candlestash_core::data::{OutputRecord, SeriesWriter};
use candlestash_core::domain::{CandleSeries, Pair, Timeframe};
use candlestash_core::exchange::ExchangeClient;
use candlestash_core::Interrupt;
use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::ledger::{series_span, DownloadLedger, LedgerEntry};
use crate::progress::RunProgress;

/// How one (pair, timeframe) unit ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Saved(OutputRecord),
    /// The exchange had no candles from the start date on.
    NoData,
    FetchFailed(String),
    /// Fetched data is discarded.
    WriteFailed(String),
}

impl PairOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, PairOutcome::Saved(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairReport {
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub outcome: PairOutcome,
}

/// Aggregate result of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// One report per attempted unit, in processing order.
    pub reports: Vec<PairReport>,
    /// Units in the plan, attempted or not.
    pub planned: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_saved()).count()
    }

    /// Everything that did not produce a file, no-data included.
    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }

    pub fn no_data(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == PairOutcome::NoData)
            .count()
    }

    pub fn saved_files(&self) -> Vec<&Path> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                PairOutcome::Saved(record) => Some(record.path.as_path()),
                _ => None,
            })
            .collect()
    }
}

/// Run every unit of `config`'s plan against `client`, saving through `writer`.
pub fn run_downloads(
    config: &RunConfig,
    client: &dyn ExchangeClient,
    writer: &SeriesWriter,
    progress: &dyn RunProgress,
    interrupt: &Interrupt,
) -> RunSummary {
    let plan = config.plan();
    let planned = plan.len();
    progress.on_plan(config, planned);

    let fetcher = HistoricalFetcher::new(client)
        .with_page_limit(config.fetch.page_limit)
        .with_page_delay(config.fetch.page_delay())
        .with_interrupt(interrupt.clone());
    let ledger = config
        .ledger
        .then(|| DownloadLedger::new(config.ledger_path()));

    let mut reports = Vec::with_capacity(planned);
    let mut interrupted = false;

    for (index, (entry, timeframe)) in plan.into_iter().enumerate() {
        if interrupt.is_triggered() {
            interrupted = true;
            break;
        }
        progress.on_pair_start(&entry.pair, timeframe, index, planned);

        let request = FetchRequest {
            pair: entry.pair.clone(),
            timeframe,
            since: entry.since.clone(),
        };
        let outcome = match fetcher.fetch_all(&request) {
            Err(FetchError::Interrupted) => {
                warn!(pair = %request.pair, %timeframe, "interrupted mid-fetch; nothing saved");
                interrupted = true;
                break;
            }
            Err(e) => PairOutcome::FetchFailed(e.to_string()),
            Ok(None) => PairOutcome::NoData,
            Ok(Some(series)) => save(writer, client.id(), series, ledger.as_ref()),
        };

        let report = PairReport {
            pair: request.pair,
            timeframe,
            outcome,
        };
        progress.on_pair_complete(&report, index, planned);
        reports.push(report);
    }

    let summary = RunSummary {
        reports,
        planned,
        interrupted,
    };
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        planned,
        interrupted,
        "run finished"
    );
    progress.on_batch_complete(&summary);
    summary
}

fn save(
    writer: &SeriesWriter,
    exchange: &str,
    series: CandleSeries,
    ledger: Option<&DownloadLedger>,
) -> PairOutcome {
    let span = series_span(&series);
    let record = match writer.write(exchange, series) {
        Ok(record) => record,
        Err(e) => {
            error!(error = %e, "write failed");
            return PairOutcome::WriteFailed(e.to_string());
        }
    };

    if let (Some(ledger), Some((first, last))) = (ledger, span) {
        let appended =
            LedgerEntry::for_record(&record, first, last).and_then(|entry| ledger.append(&entry));
        if let Err(e) = appended {
            warn!(path = %ledger.path().display(), error = %e, "could not update download ledger");
        }
    }

    PairOutcome::Saved(record)
}
