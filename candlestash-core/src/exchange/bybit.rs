//! Bybit v5 spot klines (`GET /v5/market/kline`).
//!
//! Bybit wraps rows in `{"retCode":0,"retMsg":"OK","result":{"list":[...]}}` and
//! returns them newest first, each as
//! `[startTime, open, high, low, close, volume, turnover]` (all strings).
//! Requests carry an explicit `end` so a page covers `limit` intervals forward
//! from `start`. Empty windows before the listing date are skipped until one
//! has rows or the window reaches the present.

use super::http::HttpTransport;
use super::{parse_decimal, ClientOptions, ExchangeClient, ExchangeError};
use crate::domain::{Pair, RawCandle, Timeframe};
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://api.bybit.com";
const KLINE_PATH: &str = "/v5/market/kline";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(20);
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct BybitResponse {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    result: Option<BybitResult>,
}

#[derive(Debug, Deserialize)]
struct BybitResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

pub struct BybitClient {
    transport: HttpTransport,
    base_url: String,
}

impl BybitClient {
    pub fn new(options: &ClientOptions) -> Result<Self, ExchangeError> {
        Ok(Self {
            transport: HttpTransport::new(options, MIN_REQUEST_INTERVAL)?,
            base_url: options
                .base_url
                .clone()
                .unwrap_or_else(|| BASE_URL.to_string()),
        })
    }

    pub fn interval(timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::M1 => "1",
            Timeframe::M5 => "5",
            Timeframe::M15 => "15",
            Timeframe::M30 => "30",
            Timeframe::H1 => "60",
            Timeframe::H4 => "240",
            Timeframe::D1 => "D",
            Timeframe::W1 => "W",
            Timeframe::Month1 => "M",
        }
    }

    /// Decode a kline response body into ascending raw candles.
    pub fn parse_klines(body: &str) -> Result<Vec<RawCandle>, ExchangeError> {
        let resp: BybitResponse = serde_json::from_str(body)
            .map_err(|e| ExchangeError::MalformedResponse(format!("bybit kline: {e}")))?;

        if resp.ret_code != 0 {
            return Err(ExchangeError::Api {
                status: 200,
                message: format!("retCode {}: {}", resp.ret_code, resp.ret_msg),
            });
        }

        let rows = resp.result.map(|r| r.list).unwrap_or_default();
        let mut candles = rows
            .iter()
            .map(|row| parse_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        candles.reverse();
        Ok(candles)
    }
}

fn parse_row(row: &[String]) -> Result<RawCandle, ExchangeError> {
    if row.len() < 6 {
        return Err(ExchangeError::MalformedResponse(format!(
            "bybit kline has {} fields, expected at least 6",
            row.len()
        )));
    }

    let timestamp_ms = row[0].parse::<i64>().map_err(|e| {
        ExchangeError::MalformedResponse(format!("bybit startTime '{}': {e}", row[0]))
    })?;

    Ok(RawCandle {
        timestamp_ms,
        open: parse_decimal("open", &row[1])?,
        high: parse_decimal("high", &row[2])?,
        low: parse_decimal("low", &row[3])?,
        close: parse_decimal("close", &row[4])?,
        volume: parse_decimal("volume", &row[5])?,
    })
}

impl BybitClient {
    fn fetch_window(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> Result<Vec<RawCandle>, ExchangeError> {
        let url = format!("{}{}", self.base_url, KLINE_PATH);
        let query = [
            ("category", "spot".to_string()),
            ("symbol", pair.concat()),
            ("interval", Self::interval(timeframe).to_string()),
            ("start", start_ms.to_string()),
            ("end", end_ms.to_string()),
            ("limit", limit.to_string()),
        ];
        debug!(pair = %pair, %timeframe, start_ms, end_ms, "bybit kline request");

        let body = self.transport.get(&url, &query)?;
        Self::parse_klines(&body)
    }
}

/// Request consecutive `[start, start + span)` windows from `since_ms` until one
/// has rows or a window reaches `now_ms`.
///
/// Bybit answers an empty list for a window that ends before the pair was
/// listed, which is not the end of its history.
fn walk_windows<F>(
    since_ms: i64,
    span_ms: i64,
    now_ms: i64,
    mut fetch: F,
) -> Result<Vec<RawCandle>, ExchangeError>
where
    F: FnMut(i64, i64) -> Result<Vec<RawCandle>, ExchangeError>,
{
    let span_ms = span_ms.max(1);
    let mut start_ms = since_ms;
    loop {
        let end_ms = start_ms.saturating_add(span_ms).saturating_sub(1);
        let rows = fetch(start_ms, end_ms)?;
        if !rows.is_empty() || end_ms >= now_ms || end_ms == i64::MAX {
            return Ok(rows);
        }
        debug!(start_ms, end_ms, "empty window before now; moving forward");
        start_ms = end_ms + 1;
    }
}

impl ExchangeClient for BybitClient {
    fn id(&self) -> &str {
        "bybit"
    }

    fn fetch_page(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        since_ms: i64,
        limit: u32,
    ) -> Result<Vec<RawCandle>, ExchangeError> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let span_ms = timeframe.duration_ms().saturating_mul(i64::from(limit));
        walk_windows(since_ms, span_ms, Utc::now().timestamp_millis(), |start, end| {
            self.fetch_window(pair, timeframe, start, end, limit)
        })
    }
}
