//! Candle: one OHLCV observation, and the series assembled from them.

use super::{Pair, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV row exactly as an exchange adapter returns it (open time in epoch millis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// OHLCV candle with its open time normalized to a UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Normalize a raw row. `None` if the millisecond timestamp is out of chrono's range.
    pub fn from_raw(raw: &RawCandle) -> Option<Self> {
        Some(Self {
            timestamp: DateTime::from_timestamp_millis(raw.timestamp_ms)?,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        })
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Ordered candles for one (pair, timeframe), strictly increasing by timestamp.
///
/// Built by the fetcher and moved into the writer; never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(pair: Pair, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        Self {
            pair,
            timeframe,
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// True when timestamps are strictly increasing (no duplicates, no reordering).
    pub fn is_strictly_increasing(&self) -> bool {
        self.candles
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    }
}
