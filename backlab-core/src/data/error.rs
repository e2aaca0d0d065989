use polars::prelude::PolarsError;
use thiserror::Error;

use crate::domain::SeriesError;

/// Errors raised while turning raw input into a canonical bar series.
///
/// Messages name the offending column or value so callers can fix the request.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("no timestamp column found (expected one of date, datetime, timestamp, time)")]
    NoTimestampColumn,

    #[error("No valid OHLCV rows after normalization")]
    NoValidRows,

    #[error("unsupported tick bucket '{0}' (expected 1m or 5m)")]
    UnsupportedBucket(String),

    #[error("unsupported interval '{0}' (expected one of 1m, 5m, 15m, 1h, 1d)")]
    UnsupportedInterval(String),

    #[error("ingest failed: {0}")]
    Ingest(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("series error: {0}")]
    Series(#[from] SeriesError),
}
