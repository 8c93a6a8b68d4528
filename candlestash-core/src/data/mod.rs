//! Data pipeline: historical fetching, CSV persistence and read-back.

pub mod fetcher;
pub mod reader;
pub mod schema;
pub mod writer;

pub use fetcher::{FetchError, FetchRequest, HistoricalFetcher};
pub use reader::{read_series, ReadError};
pub use writer::{OutputRecord, SeriesWriter, WriteError};
