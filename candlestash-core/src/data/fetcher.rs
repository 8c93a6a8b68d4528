//! Historical fetcher: walks an exchange's OHLCV endpoint forward in time.
//!
//! Starting from the request's start date, one page is requested at a time. After
//! each page the cursor moves to the last candle's open time plus one nominal
//! interval, so the last candle is never requested twice. The loop ends on an
//! empty page or once the cursor reaches the present, and pauses between pages
//! to respect the exchange's request-rate policy. The pause ends early on
//! interrupt.

use crate::domain::{Candle, CandleSeries, Pair, Timeframe};
use crate::exchange::{ExchangeClient, ExchangeError};
use crate::interrupt::Interrupt;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub const DEFAULT_PAGE_LIMIT: u32 = 1000;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// One (pair, timeframe) download, with the start date as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub pair: Pair,
    pub timeframe: Timeframe,
    /// ISO-8601 start date, e.g. `2017-08-17T00:00:00Z`.
    pub since: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid start date '{value}': {reason}")]
    InvalidStartDate { value: String, reason: String },

    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("exchange returned out-of-range timestamp {0}")]
    InvalidTimestamp(i64),

    #[error("interrupted")]
    Interrupted,
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

pub struct HistoricalFetcher<'a> {
    client: &'a dyn ExchangeClient,
    page_limit: u32,
    page_delay: Duration,
    clock: Clock,
    interrupt: Interrupt,
}

impl<'a> HistoricalFetcher<'a> {
    pub fn new(client: &'a dyn ExchangeClient) -> Self {
        Self {
            client,
            page_limit: DEFAULT_PAGE_LIMIT,
            page_delay: DEFAULT_PAGE_DELAY,
            clock: Box::new(|| Utc::now().timestamp_millis()),
            interrupt: Interrupt::new(),
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Replace the wall clock ("now" in epoch millis) used for the caught-up check.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Fetch the complete series from `request.since` through now.
    ///
    /// `Ok(None)` means the exchange had no candles for the pair; that is an
    /// empty outcome, not an error. Any adapter fault aborts this request only.
    pub fn fetch_all(&self, request: &FetchRequest) -> Result<Option<CandleSeries>, FetchError> {
        let result = self.paginate(request);
        if let Err(e) = &result {
            error!(
                pair = %request.pair,
                timeframe = %request.timeframe,
                error = %e,
                "fetch failed"
            );
        }
        result
    }

    fn paginate(&self, request: &FetchRequest) -> Result<Option<CandleSeries>, FetchError> {
        let FetchRequest {
            pair, timeframe, ..
        } = request;
        let mut cursor = parse_since(&request.since)?;
        let mut candles: Vec<Candle> = Vec::new();

        info!(pair = %pair, timeframe = %timeframe, since_ms = cursor, "fetching history");

        loop {
            if self.interrupt.is_triggered() {
                return Err(FetchError::Interrupted);
            }

            let page = match self
                .client
                .fetch_page(pair, *timeframe, cursor, self.page_limit)
            {
                Ok(page) => page,
                Err(ExchangeError::Interrupted) => return Err(FetchError::Interrupted),
                Err(e) => return Err(e.into()),
            };
            let Some(last) = page.last() else {
                break;
            };

            for raw in &page {
                let candle =
                    Candle::from_raw(raw).ok_or(FetchError::InvalidTimestamp(raw.timestamp_ms))?;
                if candles
                    .last()
                    .is_some_and(|prev| candle.timestamp <= prev.timestamp)
                {
                    warn!(
                        pair = %pair,
                        timeframe = %timeframe,
                        timestamp_ms = raw.timestamp_ms,
                        "skipping duplicate or out-of-order candle"
                    );
                    continue;
                }
                candles.push(candle);
            }

            info!(
                pair = %pair,
                timeframe = %timeframe,
                fetched = page.len(),
                total = candles.len(),
                "fetched page"
            );

            let next = timeframe.next_cursor(last.timestamp_ms);
            if next <= cursor {
                warn!(
                    pair = %pair,
                    timeframe = %timeframe,
                    cursor,
                    "exchange did not advance past cursor; stopping"
                );
                break;
            }
            cursor = next;

            if cursor >= (self.clock)() {
                break;
            }

            if !self.page_delay.is_zero() && self.interrupt.sleep(self.page_delay) {
                return Err(FetchError::Interrupted);
            }
        }

        if candles.is_empty() {
            warn!(pair = %pair, timeframe = %timeframe, "no data found");
            return Ok(None);
        }

        info!(pair = %pair, timeframe = %timeframe, candles = candles.len(), "fetch complete");
        Ok(Some(CandleSeries::new(pair.clone(), *timeframe, candles)))
    }
}

/// Convert an ISO-8601 start date to epoch millis (UTC).
///
/// Accepts RFC 3339 (`2017-08-17T00:00:00Z`, `…+02:00`), a zone-less date-time
/// (read as UTC) or a bare date (UTC midnight).
pub fn parse_since(value: &str) -> Result<i64, FetchError> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
        .ok_or_else(|| FetchError::InvalidStartDate {
            value: value.to_string(),
            reason: "expected RFC 3339 date-time or YYYY-MM-DD".to_string(),
        })
}
