//! Trading pair identifiers in `BASE/QUOTE` form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid trading pair '{0}' (expected BASE/QUOTE, e.g. BTC/USDT)")]
pub struct PairError(pub String);

/// A spot trading pair such as `BTC/USDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    base: String,
    quote: String,
}

impl Pair {
    pub fn new(base: &str, quote: &str) -> Result<Self, PairError> {
        let valid =
            |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(base) || !valid(quote) {
            return Err(PairError(format!("{base}/{quote}")));
        }
        Ok(Self {
            base: base.to_string(),
            quote: quote.to_string(),
        })
    }

    /// Base asset, e.g. `BTC`. Also the per-asset output directory name.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// `BTC/USDT`
    pub fn as_str(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// `BTC_USDT`, the separator replaced for use in file names.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.base, self.quote)
    }

    /// `BTCUSDT`, the market spelling used by Binance and Bybit.
    pub fn concat(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = PairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s.split_once('/').ok_or_else(|| PairError(s.to_string()))?;
        Pair::new(base, quote).map_err(|_| PairError(s.to_string()))
    }
}

impl TryFrom<String> for Pair {
    type Error = PairError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        pair.as_str()
    }
}
