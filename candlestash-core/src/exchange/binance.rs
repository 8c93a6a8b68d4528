//! Binance spot klines (`GET /api/v3/klines`).
//!
//! Binance returns each kline as a positional array:
//! `[open_time, open, high, low, close, volume, close_time, quote_volume, trades, ...]`
//! with prices and volumes encoded as strings.

use super::http::HttpTransport;
use super::{parse_decimal, ClientOptions, ExchangeClient, ExchangeError};
use crate::domain::{Pair, RawCandle, Timeframe};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://api.binance.com";
const KLINES_PATH: &str = "/api/v3/klines";
/// Binance allows 1200 request weight per minute; a klines call with limit 1000 weighs 2.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(50);
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct BinanceApiError {
    code: i64,
    msg: String,
}

pub struct BinanceClient {
    transport: HttpTransport,
    base_url: String,
}

impl BinanceClient {
    pub fn new(options: &ClientOptions) -> Result<Self, ExchangeError> {
        Ok(Self {
            transport: HttpTransport::new(options, MIN_REQUEST_INTERVAL)?,
            base_url: options
                .base_url
                .clone()
                .unwrap_or_else(|| BASE_URL.to_string()),
        })
    }

    /// Binance interval codes match our labels one for one.
    pub fn interval(timeframe: Timeframe) -> &'static str {
        timeframe.label()
    }

    /// Decode a klines response body into ascending raw candles.
    pub fn parse_klines(body: &str) -> Result<Vec<RawCandle>, ExchangeError> {
        let rows: Vec<Vec<Value>> = serde_json::from_str(body).map_err(|e| {
            match serde_json::from_str::<BinanceApiError>(body) {
                Ok(api) => ExchangeError::Api {
                    status: 200,
                    message: format!("code {}: {}", api.code, api.msg),
                },
                Err(_) => ExchangeError::MalformedResponse(format!("binance klines: {e}")),
            }
        })?;

        rows.iter().map(|row| parse_row(row)).collect()
    }
}

fn parse_row(row: &[Value]) -> Result<RawCandle, ExchangeError> {
    if row.len() < 6 {
        return Err(ExchangeError::MalformedResponse(format!(
            "binance kline has {} fields, expected at least 6",
            row.len()
        )));
    }

    let timestamp_ms = row[0].as_i64().ok_or_else(|| {
        ExchangeError::MalformedResponse(format!("binance open_time not an integer: {}", row[0]))
    })?;

    let decimal = |idx: usize, field: &str| -> Result<f64, ExchangeError> {
        match &row[idx] {
            Value::String(s) => parse_decimal(field, s),
            Value::Number(n) => n.as_f64().ok_or_else(|| {
                ExchangeError::MalformedResponse(format!("{field} out of range: {n}"))
            }),
            other => Err(ExchangeError::MalformedResponse(format!(
                "{field} has unexpected type: {other}"
            ))),
        }
    };

    Ok(RawCandle {
        timestamp_ms,
        open: decimal(1, "open")?,
        high: decimal(2, "high")?,
        low: decimal(3, "low")?,
        close: decimal(4, "close")?,
        volume: decimal(5, "volume")?,
    })
}

impl ExchangeClient for BinanceClient {
    fn id(&self) -> &str {
        "binance"
    }

    fn fetch_page(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        since_ms: i64,
        limit: u32,
    ) -> Result<Vec<RawCandle>, ExchangeError> {
        let url = format!("{}{}", self.base_url, KLINES_PATH);
        let query = [
            ("symbol", pair.concat()),
            ("interval", Self::interval(timeframe).to_string()),
            ("startTime", since_ms.to_string()),
            ("limit", limit.clamp(1, MAX_LIMIT).to_string()),
        ];
        debug!(pair = %pair, %timeframe, since_ms, "binance klines request");

        let body = self.transport.get(&url, &query)?;
        Self::parse_klines(&body)
    }
}
