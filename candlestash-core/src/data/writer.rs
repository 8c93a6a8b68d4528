//! Series writer: one CSV file per fetched (pair, timeframe) series.
//!
//! Layout: `{base_dir}/{BASE}/{exchange}_{BASE}_{QUOTE}_{timeframe}_{stamp}.csv`
//!
//! - Atomic writes (write to `.csv.tmp`, then hard-link the final name)
//! - Never overwrites: a taken name gets a `_1`, `_2`, ... suffix
//! - Timestamps rendered in UTC as `YYYY-MM-DD HH:MM:SS`

use super::schema::{self, TIMESTAMP_FORMAT};
use crate::domain::{CandleSeries, Pair, Timeframe};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("refusing to write an empty series for {pair} {timeframe}")]
    EmptySeries { pair: Pair, timeframe: Timeframe },

    #[error("invalid file-name timestamp format '{0}'")]
    InvalidTimestampFormat(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Where a series was saved, and what it held.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub path: PathBuf,
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub exchange: String,
    pub written_at: DateTime<Local>,
    pub row_count: usize,
}

pub struct SeriesWriter {
    base_dir: PathBuf,
    timestamp_format: String,
}

impl SeriesWriter {
    /// Create a writer rooted at `base_dir`, creating the directory if needed.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        timestamp_format: impl Into<String>,
    ) -> Result<Self, WriteError> {
        let base_dir = base_dir.into();
        let timestamp_format = timestamp_format.into();
        if !schema::is_valid_filename_timestamp_format(&timestamp_format) {
            return Err(WriteError::InvalidTimestampFormat(timestamp_format));
        }
        Self::ensure_directory(&base_dir)?;
        Ok(Self {
            base_dir,
            timestamp_format,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create `path` and any missing parents. Existing directories are fine.
    pub fn ensure_directory(path: &Path) -> Result<(), WriteError> {
        fs::create_dir_all(path).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write `series` stamped with the current local time.
    pub fn write(&self, exchange: &str, series: CandleSeries) -> Result<OutputRecord, WriteError> {
        self.write_at(exchange, series, Local::now())
    }

    /// Write `series` stamped with `written_at`.
    ///
    /// The series is consumed; the returned record carries everything callers
    /// need to report or index the file.
    pub fn write_at(
        &self,
        exchange: &str,
        series: CandleSeries,
        written_at: DateTime<Local>,
    ) -> Result<OutputRecord, WriteError> {
        if series.is_empty() {
            return Err(WriteError::EmptySeries {
                pair: series.pair,
                timeframe: series.timeframe,
            });
        }

        let dir = self.base_dir.join(series.pair.base());
        Self::ensure_directory(&dir)?;

        let stamp = written_at.format(&self.timestamp_format).to_string();
        let stem = format!(
            "{}_{}_{}_{stamp}",
            exchange.to_ascii_lowercase(),
            series.pair.file_stem(),
            series.timeframe
        );
        let tmp_path = dir.join(format!("{stem}.{}.csv.tmp", std::process::id()));

        let published =
            write_rows(&tmp_path, &series).and_then(|()| publish(&tmp_path, &dir, &stem));
        let path = match published {
            Ok(path) => path,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        let row_count = series.len();
        info!(path = %path.display(), rows = row_count, "saved series");

        Ok(OutputRecord {
            path,
            pair: series.pair,
            timeframe: series.timeframe,
            exchange: exchange.to_ascii_lowercase(),
            written_at,
            row_count,
        })
    }

    /// Every CSV file under the base directory, sorted by path.
    pub fn inventory(&self) -> Result<Vec<PathBuf>, WriteError> {
        let mut files = Vec::new();
        collect_csv(&self.base_dir, &mut files)?;
        files.sort();
        Ok(files)
    }
}

/// Link the finished `tmp` file under the first free `{stem}[_n].csv` name.
///
/// `hard_link` fails on an existing target instead of replacing it, so a file
/// that appears between attempts is never clobbered.
fn publish(tmp: &Path, dir: &Path, stem: &str) -> Result<PathBuf, WriteError> {
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            dir.join(format!("{stem}.csv"))
        } else {
            dir.join(format!("{stem}_{n}.csv"))
        };
        match fs::hard_link(tmp, &candidate) {
            Ok(()) => {
                if let Err(e) = fs::remove_file(tmp) {
                    warn!(path = %tmp.display(), error = %e, "could not remove temp file");
                }
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "output name taken");
                n += 1;
            }
            Err(source) => {
                return Err(WriteError::Io {
                    path: candidate,
                    source,
                })
            }
        }
    }
}

fn write_rows(path: &Path, series: &CandleSeries) -> Result<(), WriteError> {
    let io_err = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(schema::header()).map_err(csv_err)?;

    for c in &series.candles {
        wtr.write_record([
            c.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])
        .map_err(csv_err)?;
    }

    let file = wtr.into_inner().map_err(|e| io_err(e.into_error()))?;
    file.sync_all().map_err(io_err)
}

fn collect_csv(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), WriteError> {
    let entries = fs::read_dir(dir).map_err(|source| WriteError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| WriteError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            collect_csv(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "csv") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Candle, RawCandle};
    use chrono::TimeZone;

    fn series(n: usize) -> CandleSeries {
        let candles = (0..n)
            .map(|i| {
                Candle::from_raw(&RawCandle {
                    timestamp_ms: 1_502_928_000_000 + i as i64 * 3_600_000,
                    open: 4261.48,
                    high: 4313.62,
                    low: 4261.32,
                    close: 4308.83,
                    volume: 47.181009,
                })
                .unwrap()
            })
            .collect();
        CandleSeries::new("BTC/USDT".parse().unwrap(), Timeframe::H1, candles)
    }

    #[test]
    fn rejects_bad_timestamp_format() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SeriesWriter::new(dir.path(), "%Y/%m"),
            Err(WriteError::InvalidTimestampFormat(_))
        ));
    }

    #[test]
    fn same_second_writes_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeriesWriter::new(dir.path(), "%Y%m%d_%H%M%S").unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let first = writer.write_at("binance", series(2), at).unwrap();
        let second = writer.write_at("binance", series(3), at).unwrap();

        assert_ne!(first.path, second.path);
        assert!(second
            .path
            .to_string_lossy()
            .ends_with("binance_BTC_USDT_1h_20240301_120000_1.csv"));
        assert_eq!(writer.inventory().unwrap().len(), 2);
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeriesWriter::new(dir.path(), "%Y%m%d_%H%M%S").unwrap();
        let record = writer.write("binance", series(1)).unwrap();
        let leftovers: Vec<_> = fs::read_dir(record.path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn publish_never_replaces_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let stem = "binance_BTC_USDT_1h_20240301_120000";
        let taken = dir.path().join(format!("{stem}.csv"));
        fs::write(&taken, "someone else's file").unwrap();
        let tmp = dir.path().join(format!("{stem}.csv.tmp"));
        fs::write(&tmp, "fresh rows").unwrap();

        let path = publish(&tmp, dir.path(), stem).unwrap();

        assert_eq!(path, dir.path().join(format!("{stem}_1.csv")));
        assert_eq!(fs::read_to_string(&taken).unwrap(), "someone else's file");
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh rows");
        assert!(!tmp.exists());
    }
}
