//! Candlestash Runner: run configuration, download orchestration, reporting.
//!
//! This crate builds on `candlestash-core` to provide:
//! - Immutable run configuration loaded from TOML
//! - Sequential fetch-then-write orchestration over the (pair, timeframe) plan
//! - Progress reporting hooks
//! - JSONL download ledger with content hashes

pub mod config;
pub mod ledger;
pub mod orchestrator;
pub mod progress;

pub use config::{ConfigError, FetchSettings, RunConfig, SymbolEntry};
pub use ledger::{DownloadLedger, LedgerEntry, LEDGER_FILE_NAME};
pub use orchestrator::{run_downloads, PairOutcome, PairReport, RunSummary};
pub use progress::{NullProgress, RunProgress, StdoutProgress};
