//! Price data: aligned tables, the on-disk cache, suppliers and the loader

mod cache;
mod loader;
mod supplier;
mod table;

use chrono::NaiveDate;
use thiserror::Error;

pub use cache::{CachedSeries, SeriesCache};
pub use loader::DataLoader;
pub use supplier::{AlphaVantageSupplier, PriceSupplier, parse_alpha_vantage};
pub use table::{PriceRow, PriceTable};

/// Errors raised while producing price data
#[derive(Debug, Error)]
pub enum DataError {
    #[error("supplier error for {symbol}: {message}")]
    Supplier { symbol: String, message: String },

    #[error("fetch for {symbol} timed out after {ms}ms")]
    Timeout { symbol: String, ms: u64 },

    #[error("no prices for {symbol} between {start} and {end}")]
    MissingSymbol {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("no prices between {start} and {end}")]
    EmptyWindow { start: NaiveDate, end: NaiveDate },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
