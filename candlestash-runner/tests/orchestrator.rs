//! Integration tests for the run orchestrator with a scripted exchange.

use candlestash_core::data::{read_series, SeriesWriter};
use candlestash_core::domain::{Pair, RawCandle, Timeframe};
use candlestash_core::exchange::{ExchangeClient, ExchangeError};
use candlestash_core::Interrupt;
use candlestash_runner::{
    run_downloads, DownloadLedger, NullProgress, PairOutcome, PairReport, RunConfig,
    RunProgress, RunSummary, SymbolEntry,
};
use std::path::Path;
use std::sync::Mutex;

const START: &str = "2017-08-17T00:00:00Z";
const START_MS: i64 = 1_502_928_000_000;

/// `BTC/*` and `ETH/*` serve 50 candles from the start date, `BAD/*` fails with a network
/// fault, anything else has no data.
struct ScriptedExchange {
    calls: Mutex<Vec<(String, Timeframe, i64)>>,
}

impl ScriptedExchange {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, Timeframe, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ExchangeClient for ScriptedExchange {
    fn id(&self) -> &str {
        "binance"
    }

    fn fetch_page(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        since_ms: i64,
        _limit: u32,
    ) -> Result<Vec<RawCandle>, ExchangeError> {
        self.calls
            .lock()
            .unwrap()
            .push((pair.to_string(), timeframe, since_ms));
        match pair.base() {
            "BAD" => Err(ExchangeError::Network("connection refused".into())),
            "BTC" | "ETH" if since_ms == START_MS => Ok((0..50)
                .map(|i| RawCandle {
                    timestamp_ms: START_MS + i * timeframe.duration_ms(),
                    open: 4261.48,
                    high: 4485.39,
                    low: 4200.74,
                    close: 4285.08,
                    volume: 795.150377,
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Records each hook; optionally triggers an interrupt after the first completed unit.
#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
    stop_after_first: Option<Interrupt>,
}

impl RunProgress for RecordingProgress {
    fn on_plan(&self, _config: &RunConfig, total: usize) {
        self.events.lock().unwrap().push(format!("plan {total}"));
    }

    fn on_pair_start(&self, pair: &Pair, timeframe: Timeframe, index: usize, _total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {index} {pair} {timeframe}"));
    }

    fn on_pair_complete(&self, report: &PairReport, index: usize, _total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {index} {}", report.outcome.is_saved()));
        if let Some(interrupt) = &self.stop_after_first {
            interrupt.trigger();
        }
    }

    fn on_batch_complete(&self, summary: &RunSummary) {
        self.events
            .lock()
            .unwrap()
            .push(format!("batch {} {}", summary.succeeded(), summary.failed()));
    }
}

fn config(dir: &Path, pairs: &[&str], timeframes: &[Timeframe]) -> RunConfig {
    let mut config = RunConfig::default();
    config.symbols = pairs
        .iter()
        .map(|p| SymbolEntry::new(p.parse().unwrap(), START))
        .collect();
    config.timeframes = timeframes.to_vec();
    config.output_dir = dir.join("data");
    config.fetch.page_delay_ms = 0;
    config
}

fn writer(config: &RunConfig) -> SeriesWriter {
    SeriesWriter::new(config.output_dir.clone(), config.filename_timestamp_format.clone()).unwrap()
}

#[test]
fn fifty_daily_candles_become_one_file_under_base_asset_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["BTC/USDT"], &[Timeframe::D1]);
    let exchange = ScriptedExchange::new();
    let writer = writer(&config);

    let summary = run_downloads(&config, &exchange, &writer, &NullProgress, &Interrupt::new());

    assert_eq!(summary.succeeded(), 1);
    let files = summary.saved_files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].parent().unwrap(), dir.path().join("data").join("BTC"));

    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    let stamp = name
        .strip_prefix("binance_BTC_USDT_1d_")
        .and_then(|rest| rest.strip_suffix(".csv"))
        .expect("file name pattern");
    assert_eq!(stamp.len(), "YYYYMMDD_HHMMSS".len());
    assert_eq!(stamp.as_bytes()[8], b'_');
    assert!(stamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));

    assert_eq!(read_series(files[0]).unwrap().len(), 50);
}

#[test]
fn every_unit_attempted_in_configuration_order_despite_failures() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        &["BAD/USDT", "BTC/USDT", "NIL/USDT"],
        &[Timeframe::D1, Timeframe::W1],
    );
    let exchange = ScriptedExchange::new();
    let progress = RecordingProgress::default();

    let writer = writer(&config);

    let summary = run_downloads(&config, &exchange, &writer, &progress, &Interrupt::new());

    let order: Vec<(String, Timeframe)> = summary
        .reports
        .iter()
        .map(|r| (r.pair.to_string(), r.timeframe))
        .collect();
    assert_eq!(
        order,
        vec![
            ("BAD/USDT".to_string(), Timeframe::D1),
            ("BAD/USDT".to_string(), Timeframe::W1),
            ("BTC/USDT".to_string(), Timeframe::D1),
            ("BTC/USDT".to_string(), Timeframe::W1),
            ("NIL/USDT".to_string(), Timeframe::D1),
            ("NIL/USDT".to_string(), Timeframe::W1),
        ]
    );
    assert!(matches!(summary.reports[0].outcome, PairOutcome::FetchFailed(_)));
    assert!(summary.reports[2].outcome.is_saved());
    assert_eq!(summary.reports[4].outcome, PairOutcome::NoData);

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 4);
    assert_eq!(summary.no_data(), 2);
    assert!(!summary.interrupted);

    // One page per failing or empty unit, two per BTC unit (data, then empty).
    let first_calls: Vec<String> = exchange
        .calls()
        .iter()
        .filter(|(_, _, since)| *since == START_MS)
        .map(|(pair, tf, _)| format!("{pair} {tf}"))
        .collect();
    assert_eq!(first_calls.len(), 6);
    assert_eq!(exchange.calls().len(), 8);

    let events = progress.events.lock().unwrap();
    assert_eq!(events.first().unwrap(), "plan 6");
    assert_eq!(events.last().unwrap(), "batch 2 4");
}

#[test]
fn network_fault_writes_nothing_for_that_pair() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["BAD/USDT", "BTC/USDT"], &[Timeframe::D1]);
    let exchange = ScriptedExchange::new();
    let writer = writer(&config);

    let summary = run_downloads(&config, &exchange, &writer, &NullProgress, &Interrupt::new());

    match &summary.reports[0].outcome {
        PairOutcome::FetchFailed(message) => assert!(message.contains("connection refused")),
        other => panic!("expected FetchFailed, got {other:?}"),
    }
    assert!(!dir.path().join("data").join("BAD").exists());
    assert!(summary.reports[1].outcome.is_saved());
    assert_eq!(writer.inventory().unwrap().len(), 1);
}

fn leftover_temp_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(leftover_temp_files(&path));
        } else if path.to_string_lossy().ends_with(".csv.tmp") {
            found.push(path);
        }
    }
    found
}

#[test]
fn blocked_asset_dir_is_a_write_failure_and_the_run_goes_on() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["BTC/USDT", "ETH/USDT"], &[Timeframe::D1]);
    let exchange = ScriptedExchange::new();
    let writer = writer(&config);
    std::fs::write(config.output_dir.join("BTC"), "not a directory").unwrap();

    let summary = run_downloads(&config, &exchange, &writer, &NullProgress, &Interrupt::new());

    match &summary.reports[0].outcome {
        PairOutcome::WriteFailed(message) => assert!(message.contains("BTC"), "{message}"),
        other => panic!("expected WriteFailed, got {other:?}"),
    }
    assert!(summary.reports[1].outcome.is_saved());
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.interrupted);
    assert!(leftover_temp_files(&config.output_dir).is_empty());
    assert!(config.output_dir.join("BTC").is_file());
}

#[test]
fn empty_first_page_is_no_data_without_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["NIL/USDT"], &[Timeframe::H1]);
    let exchange = ScriptedExchange::new();
    let writer = writer(&config);

    let summary = run_downloads(&config, &exchange, &writer, &NullProgress, &Interrupt::new());

    assert_eq!(summary.reports[0].outcome, PairOutcome::NoData);
    assert_eq!(summary.failed(), 1);
    assert!(writer.inventory().unwrap().is_empty());
    assert_eq!(exchange.calls().len(), 1);
}

#[test]
fn bad_start_date_fails_only_that_pair() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), &["BTC/USDT", "BTC/USDC"], &[Timeframe::D1]);
    config.symbols[0].since = "someday".into();
    let exchange = ScriptedExchange::new();

    let writer = writer(&config);

    let summary = run_downloads(&config, &exchange, &writer, &NullProgress, &Interrupt::new());

    match &summary.reports[0].outcome {
        PairOutcome::FetchFailed(message) => assert!(message.contains("someday")),
        other => panic!("expected FetchFailed, got {other:?}"),
    }
    assert!(summary.reports[1].outcome.is_saved());
}

#[test]
fn ledger_records_each_saved_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        &["BTC/USDT", "NIL/USDT"],
        &[Timeframe::D1, Timeframe::W1],
    );
    let exchange = ScriptedExchange::new();

    let writer = writer(&config);

    let summary = run_downloads(&config, &exchange, &writer, &NullProgress, &Interrupt::new());

    let entries = DownloadLedger::new(config.ledger_path()).read_all().unwrap();
    assert_eq!(entries.len(), summary.succeeded());
    assert_eq!(entries[0].row_count, 50);
    assert_eq!(entries[0].first_timestamp.timestamp_millis(), START_MS);
    let bytes = std::fs::read(&entries[0].path).unwrap();
    assert_eq!(entries[0].blake3, blake3::hash(&bytes).to_hex().to_string());
}

#[test]
fn ledger_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), &["BTC/USDT"], &[Timeframe::D1]);
    config.ledger = false;
    let exchange = ScriptedExchange::new();

    run_downloads(&config, &exchange, &writer(&config), &NullProgress, &Interrupt::new());

    assert!(!config.ledger_path().exists());
}

#[test]
fn interrupt_before_start_attempts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["BTC/USDT"], &[Timeframe::D1]);
    let exchange = ScriptedExchange::new();
    let interrupt = Interrupt::new();
    interrupt.trigger();

    let summary = run_downloads(&config, &exchange, &writer(&config), &NullProgress, &interrupt);

    assert!(summary.interrupted);
    assert!(summary.reports.is_empty());
    assert_eq!(summary.planned, 1);
    assert!(exchange.calls().is_empty());
}

#[test]
fn interrupt_stops_before_the_next_unit() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        &["BTC/USDT"],
        &[Timeframe::D1, Timeframe::W1, Timeframe::Month1],
    );
    let exchange = ScriptedExchange::new();
    let interrupt = Interrupt::new();
    let progress = RecordingProgress {
        stop_after_first: Some(interrupt.clone()),
        ..Default::default()
    };

    let summary = run_downloads(&config, &exchange, &writer(&config), &progress, &interrupt);

    assert!(summary.interrupted);
    assert_eq!(summary.reports.len(), 1);
    assert!(summary.reports[0].outcome.is_saved());
    assert_eq!(summary.saved_files().len(), 1);
}
