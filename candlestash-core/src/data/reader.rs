//! Load a saved series file back into candles.

use super::schema::{self, TIMESTAMP_FORMAT};
use crate::domain::Candle;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("CSV error reading {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unexpected header in {}: {found}", path.display())]
    BadHeader { path: PathBuf, found: String },

    #[error("{}: row {row}: {reason}", path.display())]
    BadRow {
        path: PathBuf,
        row: usize,
        reason: String,
    },
}

/// Read every candle from a file produced by the series writer.
pub fn read_series(path: &Path) -> Result<Vec<Candle>, ReadError> {
    let csv_err = |source| ReadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::Reader::from_path(path).map_err(csv_err)?;

    let headers = rdr.headers().map_err(csv_err)?;
    if headers.iter().ne(schema::header()) {
        return Err(ReadError::BadHeader {
            path: path.to_path_buf(),
            found: headers.iter().collect::<Vec<_>>().join(","),
        });
    }

    let mut candles = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let row = i + 1;
        let bad = |reason: String| ReadError::BadRow {
            path: path.to_path_buf(),
            row,
            reason,
        };
        if record.len() != 6 {
            return Err(bad(format!("expected 6 fields, found {}", record.len())));
        }

        let timestamp = NaiveDateTime::parse_from_str(&record[0], TIMESTAMP_FORMAT)
            .map_err(|e| bad(format!("timestamp '{}': {e}", &record[0])))?
            .and_utc();
        let mut values = [0.0f64; 5];
        for (slot, (field, (_, label))) in values
            .iter_mut()
            .zip(record.iter().skip(1).zip(schema::COLUMN_LABELS.iter().skip(1)))
        {
            *slot = field
                .parse()
                .map_err(|e| bad(format!("{label} '{field}': {e}")))?;
        }
        let [open, high, low, close, volume] = values;

        candles.push(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }
    Ok(candles)
}
