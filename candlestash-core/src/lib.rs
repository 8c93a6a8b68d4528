//! Candlestash Core: exchange adapters, domain types, historical fetcher, series writer.
//!
//! This crate contains everything needed to pull one complete OHLCV history:
//! - Domain types (pairs, timeframes, candles, series)
//! - Rate-limited exchange clients behind the `ExchangeClient` trait
//! - Paginating fetcher that walks an exchange forward from a start date
//! - Atomic CSV writer and matching reader

pub mod data;
pub mod domain;
pub mod exchange;
pub mod interrupt;

pub use interrupt::Interrupt;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across the signal-handler thread and
    /// the download loop are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Pair>();
        require_sync::<domain::Pair>();
        require_send::<domain::CandleSeries>();
        require_sync::<domain::CandleSeries>();
        require_send::<data::OutputRecord>();
        require_sync::<data::OutputRecord>();
        require_send::<Interrupt>();
        require_sync::<Interrupt>();
        require_send::<exchange::RequestPacer>();
        require_sync::<exchange::RequestPacer>();
        require_send::<exchange::BinanceClient>();
        require_sync::<exchange::BinanceClient>();
        require_send::<exchange::BybitClient>();
        require_sync::<exchange::BybitClient>();
        require_sync::<data::SeriesWriter>();
    }
}
