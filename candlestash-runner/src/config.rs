//! Run configuration: which exchange, which pairs from when, which timeframes, where to.
//!
//! Loaded once at startup and passed by reference into the orchestrator.

use candlestash_core::data::fetcher::{DEFAULT_PAGE_DELAY, DEFAULT_PAGE_LIMIT};
use candlestash_core::data::schema::{
    is_valid_filename_timestamp_format, DEFAULT_FILENAME_TIMESTAMP_FORMAT,
};
use candlestash_core::domain::{Pair, Timeframe};
use candlestash_core::exchange::ClientOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Largest page either supported exchange serves.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Upper bound for `fetch.max_retries`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One configured pair and the date its history starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymbolEntry {
    pub pair: Pair,
    /// ISO-8601 start date. Parsed by the fetcher, not at load.
    pub since: String,
}

impl SymbolEntry {
    pub fn new(pair: Pair, since: impl Into<String>) -> Self {
        Self {
            pair,
            since: since.into(),
        }
    }
}

/// Pagination and HTTP settings (`[fetch]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub page_limit: u32,
    pub page_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        let client = ClientOptions::default();
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            page_delay_ms: DEFAULT_PAGE_DELAY.as_millis() as u64,
            request_timeout_secs: client.request_timeout.as_secs(),
            max_retries: client.max_retries,
        }
    }
}

impl FetchSettings {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub exchange: String,
    /// Processing order is array order.
    pub symbols: Vec<SymbolEntry>,
    pub timeframes: Vec<Timeframe>,
    pub output_dir: PathBuf,
    pub filename_timestamp_format: String,
    /// Append a `downloads.jsonl` entry per saved file.
    pub ledger: bool,
    pub fetch: FetchSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        let since = "2017-08-17T00:00:00Z";
        Self {
            exchange: "binance".into(),
            symbols: ["BTC/USDT", "ETH/USDT"]
                .iter()
                .filter_map(|pair| pair.parse().ok())
                .map(|pair| SymbolEntry::new(pair, since))
                .collect(),
            timeframes: vec![
                Timeframe::H1,
                Timeframe::H4,
                Timeframe::D1,
                Timeframe::W1,
                Timeframe::Month1,
            ],
            output_dir: PathBuf::from("data"),
            filename_timestamp_format: DEFAULT_FILENAME_TIMESTAMP_FORMAT.into(),
            ledger: true,
            fetch: FetchSettings::default(),
        }
    }
}

impl RunConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string. Omitted keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange.trim().is_empty() {
            return Err(ConfigError::Invalid("exchange must not be empty".into()));
        }
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid("at least one symbol is required".into()));
        }
        if self.timeframes.is_empty() {
            return Err(ConfigError::Invalid("at least one timeframe is required".into()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&self.fetch.page_limit) {
            return Err(ConfigError::Invalid(format!(
                "fetch.page_limit must be between 1 and {MAX_PAGE_LIMIT}, got {}",
                self.fetch.page_limit
            )));
        }
        if self.fetch.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.request_timeout_secs must be positive".into()));
        }
        if self.fetch.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "fetch.max_retries must be at most {MAX_RETRIES}, got {}",
                self.fetch.max_retries
            )));
        }
        if !is_valid_filename_timestamp_format(&self.filename_timestamp_format) {
            return Err(ConfigError::Invalid(format!(
                "filename_timestamp_format '{}' is not a usable strftime pattern",
                self.filename_timestamp_format
            )));
        }
        Ok(())
    }

    /// Options for building the exchange client.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            max_retries: self.fetch.max_retries,
            ..ClientOptions::default()
        }
    }

    /// Every (pair, timeframe) unit in processing order: symbols, then timeframes.
    pub fn plan(&self) -> Vec<(&SymbolEntry, Timeframe)> {
        self.symbols
            .iter()
            .flat_map(|entry| self.timeframes.iter().map(move |tf| (entry, *tf)))
            .collect()
    }

    /// Where the download ledger lives.
    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join(crate::ledger::LEDGER_FILE_NAME)
    }
}
