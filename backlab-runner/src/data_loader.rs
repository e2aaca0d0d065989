//! Series resolution for the runner.
//!
//! A request names where its bars come from:
//! 1. A local CSV/Parquet file, read through polars and normalized.
//! 2. A symbol/interval/period fetched through an injected [`BarProvider`].
//!
//! The interval is validated before any fetch. Either way the result is a
//! canonical series plus a BLAKE3 dataset hash for run ids.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use backlab_core::data::{
    normalize_with_report, BarProvider, DataError, DataIngestor, FetchRequest, Interval,
    NormalizeReport, SourceHint,
};
use backlab_core::domain::BarSeries;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no bar provider configured for symbol '{symbol}'")]
    NoProvider { symbol: String },

    #[error("data file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Where a series comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesSource {
    File {
        path: PathBuf,
        #[serde(default)]
        hint: SourceHint,
    },
    Provider {
        symbol: String,
        interval: String,
        period: String,
    },
}

impl SeriesSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            hint: SourceHint::default(),
        }
    }

    /// Short description for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Provider {
                symbol,
                interval,
                period,
            } => format!("{symbol} {interval} {period}"),
        }
    }
}

/// A loaded, normalized series with provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: BarSeries,
    pub report: NormalizeReport,
    /// BLAKE3 over the canonical bars.
    pub dataset_hash: String,
    pub origin: String,
}

/// Resolve `source` into a canonical series.
pub fn load_series(
    source: &SeriesSource,
    provider: Option<&dyn BarProvider>,
) -> Result<LoadedSeries, LoadError> {
    let (series, report) = match source {
        SeriesSource::File { path, hint } => {
            if !path.exists() {
                return Err(LoadError::FileNotFound(path.clone()));
            }
            DataIngestor::new().load(path, hint)?
        }
        SeriesSource::Provider {
            symbol,
            interval,
            period,
        } => {
            let interval: Interval = interval.parse()?;
            let provider = provider.ok_or_else(|| LoadError::NoProvider {
                symbol: symbol.clone(),
            })?;
            let request = FetchRequest {
                symbol: symbol.clone(),
                interval,
                period: period.clone(),
            };
            let frame = provider.fetch(&request)?;
            normalize_with_report(&frame, &SourceHint::default())?
        }
    };

    let origin = source.describe();
    info!(
        source = %origin,
        bars = series.len(),
        rows_in = report.rows_in,
        "series loaded"
    );
    Ok(LoadedSeries {
        dataset_hash: series.content_hash(),
        series,
        report,
        origin,
    })
}
