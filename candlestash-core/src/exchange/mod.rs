//! Exchange client adapter: the single point of contact with an exchange.
//!
//! The `ExchangeClient` trait exposes one operation, "fetch one page of candles
//! starting at T". Concrete clients are picked by identifier through an explicit
//! registry so unknown exchanges fail closed at startup, and tests can swap in a
//! scripted client without touching the network.

pub mod binance;
pub mod bybit;
pub mod http;
pub mod pacing;

use crate::domain::{Pair, RawCandle, Timeframe};
use crate::Interrupt;
use std::time::Duration;
use thiserror::Error;

pub use binance::BinanceClient;
pub use bybit::BybitClient;
pub use pacing::RequestPacer;

/// Errors raised by exchange adapters.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("unsupported exchange '{id}' (supported: {supported})")]
    UnsupportedExchange { id: String, supported: String },

    #[error("error initializing exchange client: {0}")]
    Initialization(String),

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("rate limited by exchange (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("exchange API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("interrupted")]
    Interrupted,
}

/// Settings shared by every HTTP-backed client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Replaces the exchange's public REST host (testnets, local mocks).
    pub base_url: Option<String>,
    /// Cuts retry waits short; a triggered client refuses new requests.
    pub interrupt: Interrupt,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            base_url: None,
            interrupt: Interrupt::new(),
        }
    }
}

/// Narrow interface over an exchange's OHLCV endpoint.
pub trait ExchangeClient: Send + Sync {
    /// Identifier this client was registered under, e.g. `binance`.
    fn id(&self) -> &str;

    /// Fetch up to `limit` candles opening at or after `since_ms`, ascending by time.
    ///
    /// An empty vector means the exchange has no more data from `since_ms` on.
    /// Blocks on the client's rate limiter when called too frequently.
    fn fetch_page(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        since_ms: i64,
        limit: u32,
    ) -> Result<Vec<RawCandle>, ExchangeError>;
}

type Constructor = fn(&ClientOptions) -> Result<Box<dyn ExchangeClient>, ExchangeError>;

/// Known exchanges and how to build a client for each.
const REGISTRY: &[(&str, Constructor)] = &[("binance", build_binance), ("bybit", build_bybit)];

fn build_binance(opts: &ClientOptions) -> Result<Box<dyn ExchangeClient>, ExchangeError> {
    Ok(Box::new(BinanceClient::new(opts)?))
}

fn build_bybit(opts: &ClientOptions) -> Result<Box<dyn ExchangeClient>, ExchangeError> {
    Ok(Box::new(BybitClient::new(opts)?))
}

/// Identifiers accepted by [`connect`].
pub fn supported_exchanges() -> Vec<&'static str> {
    REGISTRY.iter().map(|(id, _)| *id).collect()
}

/// Build a rate-limited client for `exchange_id` (case-insensitive).
pub fn connect(
    exchange_id: &str,
    options: &ClientOptions,
) -> Result<Box<dyn ExchangeClient>, ExchangeError> {
    let wanted = exchange_id.trim().to_ascii_lowercase();
    let (_, build) = REGISTRY
        .iter()
        .find(|(id, _)| *id == wanted)
        .ok_or_else(|| ExchangeError::UnsupportedExchange {
            id: exchange_id.to_string(),
            supported: supported_exchanges().join(", "),
        })?;
    build(options)
}

/// Parse a decimal string field from an exchange payload.
pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<f64, ExchangeError> {
    value
        .parse::<f64>()
        .map_err(|e| ExchangeError::MalformedResponse(format!("{field} '{value}': {e}")))
}
