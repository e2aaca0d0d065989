//! Bar series normalizer.
//!
//! Turns a raw polars frame (any column casing, any timestamp representation,
//! possibly unsorted with duplicates) into a canonical [`BarSeries`].
//!
//! Pipeline:
//! 1. Resolve column names case-insensitively.
//! 2. Pick the timestamp column: date, datetime, timestamp, time, then the
//!    hinted index column.
//! 3. Coerce timestamps and OHLCV values; drop rows that fail.
//! 4. Canonicalize through polars: sort ascending, keep the last row per timestamp.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::ticks::{self, BucketWidth};
use crate::data::timestamp::{self, from_micros, to_micros};
use crate::data::DataError;
use crate::domain::{Bar, BarSeries};

/// Timestamp column names, in priority order.
pub const TIMESTAMP_CANDIDATES: [&str; 4] = ["date", "datetime", "timestamp", "time"];

const REQUIRED_PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// What kind of raw input a frame holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SourceHint {
    /// One row per bar. `index_column` names a column that carried the row
    /// index (e.g. a frame written with its datetime index), used only when
    /// none of the standard timestamp names is present.
    Ohlcv {
        #[serde(default)]
        index_column: Option<String>,
    },
    /// One row per trade, bucketed into fixed-width bars.
    Ticks { width: BucketWidth },
}

impl Default for SourceHint {
    fn default() -> Self {
        Self::Ohlcv { index_column: None }
    }
}

/// Row accounting for one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub rows_in: usize,
    pub dropped_timestamp: usize,
    pub dropped_price: usize,
    pub duplicates_collapsed: usize,
    pub rows_out: usize,
}

/// Normalize a raw frame into a canonical bar series.
pub fn normalize(df: &DataFrame, hint: &SourceHint) -> Result<BarSeries, DataError> {
    normalize_with_report(df, hint).map(|(series, _)| series)
}

/// Same as [`normalize`], also returning what was dropped along the way.
pub fn normalize_with_report(
    df: &DataFrame,
    hint: &SourceHint,
) -> Result<(BarSeries, NormalizeReport), DataError> {
    let (series, report) = match hint {
        SourceHint::Ohlcv { index_column } => normalize_ohlcv(df, index_column.as_deref())?,
        SourceHint::Ticks { width } => ticks::ticks_to_bars(df, *width)?,
    };
    if report.dropped_timestamp + report.dropped_price > 0 {
        warn!(
            dropped_timestamp = report.dropped_timestamp,
            dropped_price = report.dropped_price,
            "dropped unparseable rows during normalization"
        );
    }
    debug!(rows_in = report.rows_in, rows_out = report.rows_out, "normalized bar series");
    Ok((series, report))
}

fn normalize_ohlcv(
    df: &DataFrame,
    index_column: Option<&str>,
) -> Result<(BarSeries, NormalizeReport), DataError> {
    let columns = ColumnIndex::new(df);

    let ts_name = columns
        .find_timestamp(index_column)
        .ok_or(DataError::NoTimestampColumn)?;

    let mut prices = Vec::with_capacity(REQUIRED_PRICE_COLUMNS.len());
    for name in REQUIRED_PRICE_COLUMNS {
        let original = columns
            .get(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))?;
        prices.push(coerce_numeric(df.column(original)?)?);
    }
    let volume = match columns.get("volume") {
        Some(original) => coerce_numeric(df.column(original)?)?,
        None => vec![Some(0.0); df.height()],
    };
    let stamps = timestamp::coerce_column(df.column(ts_name)?)?;

    let mut report = NormalizeReport {
        rows_in: df.height(),
        ..Default::default()
    };
    let mut rows = RowBuffer::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(ts) = stamps[i] else {
            report.dropped_timestamp += 1;
            continue;
        };
        let ohlc = [prices[0][i], prices[1][i], prices[2][i], prices[3][i]];
        let Some([open, high, low, close]) = valid_prices(ohlc) else {
            report.dropped_price += 1;
            continue;
        };
        // Missing or negative volume is treated as no volume.
        let vol = volume[i].filter(|v| *v >= 0.0).unwrap_or(0.0);
        rows.push(ts, open, high, low, close, vol);
    }

    let kept = rows.len();
    let frame = canonicalize(rows.into_frame()?.lazy()).collect()?;
    report.duplicates_collapsed = kept - frame.height();
    report.rows_out = frame.height();

    let series = frame_to_series(&frame)?;
    Ok((series, report))
}

fn valid_prices(ohlc: [Option<f64>; 4]) -> Option<[f64; 4]> {
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(ohlc) {
        match value {
            Some(v) if v > 0.0 => *slot = v,
            _ => return None,
        }
    }
    Some(out)
}

/// Sort ascending by timestamp and keep the last row for each duplicate timestamp.
///
/// Sorting is stable, so "last" means last in input order.
pub fn canonicalize(frame: LazyFrame) -> LazyFrame {
    frame
        .sort(
            ["timestamp"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .unique_stable(Some(vec!["timestamp".into()]), UniqueKeepStrategy::Last)
}

/// Read a canonical frame (`timestamp` as i64 microseconds plus f64 OHLCV) into bars.
pub(crate) fn frame_to_series(frame: &DataFrame) -> Result<BarSeries, DataError> {
    if frame.height() == 0 {
        return Err(DataError::NoValidRows);
    }
    let ts = frame.column("timestamp")?.i64()?;
    let open = frame.column("open")?.f64()?;
    let high = frame.column("high")?.f64()?;
    let low = frame.column("low")?.f64()?;
    let close = frame.column("close")?.f64()?;
    let volume = frame.column("volume")?.f64()?;

    let mut bars = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        let (Some(t), Some(o), Some(h), Some(l), Some(c)) =
            (ts.get(i), open.get(i), high.get(i), low.get(i), close.get(i))
        else {
            continue;
        };
        let timestamp = from_micros(t)
            .ok_or_else(|| DataError::InvalidData(format!("timestamp out of range: {t}")))?;
        bars.push(Bar {
            timestamp,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: volume.get(i).unwrap_or(0.0),
        });
    }
    if bars.is_empty() {
        return Err(DataError::NoValidRows);
    }
    Ok(BarSeries::new(bars)?)
}

/// Coerce any column to optional finite floats. Text is parsed after trimming.
pub fn coerce_numeric(column: &Column) -> Result<Vec<Option<f64>>, DataError> {
    let dtype = column.dtype();
    let values: Vec<Option<f64>> = if matches!(dtype, DataType::String) {
        column
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect()
    } else if dtype.is_float() || dtype.is_integer() || matches!(dtype, DataType::Boolean) {
        column.cast(&DataType::Float64)?.f64()?.into_iter().collect()
    } else {
        return Err(DataError::InvalidData(format!(
            "column '{}' has non-numeric type {dtype}",
            column.name()
        )));
    };
    Ok(values
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Lower-cased, trimmed column name -> original column name.
pub(crate) struct ColumnIndex<'a> {
    names: HashMap<String, &'a str>,
}

impl<'a> ColumnIndex<'a> {
    pub(crate) fn new(df: &'a DataFrame) -> Self {
        let mut names = HashMap::new();
        for name in df.get_column_names() {
            names
                .entry(name.as_str().trim().to_lowercase())
                .or_insert(name.as_str());
        }
        Self { names }
    }

    pub(crate) fn get(&self, canonical: &str) -> Option<&'a str> {
        self.names.get(canonical).copied()
    }

    pub(crate) fn find_timestamp(&self, index_column: Option<&str>) -> Option<&'a str> {
        TIMESTAMP_CANDIDATES
            .iter()
            .find_map(|c| self.get(c))
            .or_else(|| index_column.and_then(|c| self.get(&c.trim().to_lowercase())))
    }
}

/// Column-wise staging area for validated rows.
pub(crate) struct RowBuffer {
    timestamp: Vec<i64>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

impl RowBuffer {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            timestamp: Vec::with_capacity(n),
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
            volume: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(
        &mut self,
        ts: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) {
        self.timestamp.push(to_micros(ts));
        self.open.push(open);
        self.high.push(high);
        self.low.push(low);
        self.close.push(close);
        self.volume.push(volume);
    }

    pub(crate) fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub(crate) fn into_frame(self) -> Result<DataFrame, DataError> {
        Ok(df!(
            "timestamp" => self.timestamp,
            "open" => self.open,
            "high" => self.high,
            "low" => self.low,
            "close" => self.close,
            "volume" => self.volume,
        )?)
    }
}
