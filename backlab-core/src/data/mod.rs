//! Data ingestion and normalization

pub mod error;
pub mod ingest;
pub mod normalize;
pub mod provider;
pub mod ticks;
pub mod timestamp;

pub use error::DataError;
pub use ingest::DataIngestor;
pub use normalize::{normalize, normalize_with_report, NormalizeReport, SourceHint};
pub use provider::{AccountInfo, AccountProvider, BarProvider, FetchRequest, Interval};
pub use ticks::{ticks_to_bars, BucketWidth};
