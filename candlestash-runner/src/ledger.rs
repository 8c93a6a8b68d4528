//! Download ledger: JSONL append-only index of every saved series file.
//!
//! One JSON object per line, so a crash mid-append can lose at most the last
//! entry. Each entry carries a BLAKE3 hash of the file as written, letting
//! downstream tools detect files edited or truncated after download.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use candlestash_core::data::OutputRecord;
use candlestash_core::domain::{CandleSeries, Pair, Timeframe};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

pub const LEDGER_FILE_NAME: &str = "downloads.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub path: PathBuf,
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub exchange: String,
    pub written_at: DateTime<Local>,
    pub row_count: usize,
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
    pub blake3: String,
}

impl LedgerEntry {
    /// Build an entry for a freshly written file, hashing its contents.
    ///
    /// `first`/`last` come from the series before it was handed to the writer.
    pub fn for_record(
        record: &OutputRecord,
        first_timestamp: DateTime<Utc>,
        last_timestamp: DateTime<Utc>,
    ) -> io::Result<Self> {
        let bytes = fs::read(&record.path)?;
        Ok(Self {
            path: record.path.clone(),
            pair: record.pair.clone(),
            timeframe: record.timeframe,
            exchange: record.exchange.clone(),
            written_at: record.written_at,
            row_count: record.row_count,
            first_timestamp,
            last_timestamp,
            blake3: blake3::hash(&bytes).to_hex().to_string(),
        })
    }
}

/// First and last candle open times of a series, if any.
pub fn series_span(series: &CandleSeries) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((series.first()?.timestamp, series.last()?.timestamp))
}

pub struct DownloadLedger {
    path: PathBuf,
}

impl DownloadLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, entry: &LedgerEntry) -> io::Result<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{json}")?;
        file.flush()
    }

    /// Read all entries. Malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<LedgerEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let reader = io::BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<LedgerEntry>(&line) {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
