//! Domain types for candlestash

pub mod candle;
pub mod pair;
pub mod timeframe;

pub use candle::{Candle, CandleSeries, RawCandle};
pub use pair::{Pair, PairError};
pub use timeframe::{Timeframe, TimeframeError};
