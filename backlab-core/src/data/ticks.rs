//! Trade ticks to fixed-width bars.
//!
//! Each bucket becomes one bar: open = first price, high = max, low = min,
//! close = last price, volume = summed size. Buckets without trades produce
//! no bar.

use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::normalize::{coerce_numeric, frame_to_series, ColumnIndex, NormalizeReport};
use crate::data::timestamp::{self, to_micros};
use crate::data::DataError;
use crate::domain::BarSeries;

const MICROS_PER_MINUTE: i64 = 60_000_000;

/// Supported bucket widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketWidth {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinute,
}

impl BucketWidth {
    pub fn minutes(&self) -> i64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinute => 5,
        }
    }

    fn micros(&self) -> i64 {
        self.minutes() * MICROS_PER_MINUTE
    }
}

impl FromStr for BucketWidth {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinute),
            other => Err(DataError::UnsupportedBucket(other.to_string())),
        }
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// Bucket a tick frame (`timestamp`/`time`, `price`, optional `size`) into bars.
pub fn ticks_to_bars(
    df: &DataFrame,
    width: BucketWidth,
) -> Result<(BarSeries, NormalizeReport), DataError> {
    let columns = ColumnIndex::new(df);
    let ts_name = columns
        .get("timestamp")
        .or_else(|| columns.get("time"))
        .ok_or(DataError::NoTimestampColumn)?;
    let price_name = columns
        .get("price")
        .ok_or_else(|| DataError::MissingColumn("price".into()))?;

    let stamps = timestamp::coerce_column(df.column(ts_name)?)?;
    let prices = coerce_numeric(df.column(price_name)?)?;
    let sizes = match columns.get("size") {
        Some(name) => coerce_numeric(df.column(name)?)?,
        None => vec![Some(1.0); df.height()],
    };

    let mut report = NormalizeReport {
        rows_in: df.height(),
        ..Default::default()
    };
    let step = width.micros();
    let mut ts_col = Vec::with_capacity(df.height());
    let mut bucket_col = Vec::with_capacity(df.height());
    let mut price_col = Vec::with_capacity(df.height());
    let mut size_col = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(ts) = stamps[i] else {
            report.dropped_timestamp += 1;
            continue;
        };
        let Some(price) = prices[i].filter(|p| *p > 0.0) else {
            report.dropped_price += 1;
            continue;
        };
        let micros = to_micros(ts);
        ts_col.push(micros);
        bucket_col.push(micros.div_euclid(step) * step);
        price_col.push(price);
        size_col.push(sizes[i].filter(|s| *s >= 0.0).unwrap_or(0.0));
    }
    if ts_col.is_empty() {
        return Err(DataError::NoValidRows);
    }

    let frame = df!(
        "tick_ts" => ts_col,
        "bucket" => bucket_col,
        "price" => price_col,
        "size" => size_col,
    )?;
    let bars = frame
        .lazy()
        .sort(
            ["tick_ts"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .group_by_stable([col("bucket")])
        .agg([
            col("price").first().alias("open"),
            col("price").max().alias("high"),
            col("price").min().alias("low"),
            col("price").last().alias("close"),
            col("size").sum().alias("volume"),
        ])
        .select([
            col("bucket").alias("timestamp"),
            col("open"),
            col("high"),
            col("low"),
            col("close"),
            col("volume"),
        ])
        .collect()?;

    report.rows_out = bars.height();
    let series = frame_to_series(&bars)?;
    Ok((series, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn minute(h: u32, m: u32, s: u32) -> String {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    #[test]
    fn one_minute_buckets() {
        let df = df!(
            "timestamp" => &[minute(9, 30, 5), minute(9, 30, 40), minute(9, 30, 20), minute(9, 31, 1)],
            "price" => &[10.0, 12.0, 9.0, 11.0],
            "size" => &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

        let (series, report) = ticks_to_bars(&df, BucketWidth::OneMinute).unwrap();
        assert_eq!(series.len(), 2);
        let first = series.bars()[0];
        // Ordered by tick time: 10.0 (:05), 9.0 (:20), 12.0 (:40)
        assert_eq!(first.open, 10.0);
        assert_eq!(first.high, 12.0);
        assert_eq!(first.low, 9.0);
        assert_eq!(first.close, 12.0);
        assert_eq!(first.volume, 6.0);
        assert_eq!(series.bars()[1].close, 11.0);
        assert_eq!(report.rows_out, 2);
    }

    #[test]
    fn empty_buckets_are_skipped() {
        let df = df!(
            "time" => &[minute(9, 30, 0), minute(9, 47, 0)],
            "price" => &[10.0, 11.0],
        )
        .unwrap();

        let (series, _) = ticks_to_bars(&df, BucketWidth::FiveMinute).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.bars()[1].timestamp.format("%H:%M").to_string(),
            "09:45"
        );
    }

    #[test]
    fn size_defaults_to_one() {
        let df = df!(
            "timestamp" => &[minute(9, 30, 0), minute(9, 30, 10), minute(9, 30, 20)],
            "price" => &[10.0, 11.0, 12.0],
        )
        .unwrap();

        let (series, _) = ticks_to_bars(&df, BucketWidth::OneMinute).unwrap();
        assert_eq!(series.bars()[0].volume, 3.0);
    }

    #[test]
    fn price_column_required() {
        let df = df!("timestamp" => &[minute(9, 30, 0)], "last" => &[1.0]).unwrap();
        let err = ticks_to_bars(&df, BucketWidth::OneMinute).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(ref c) if c == "price"));
    }

    #[test]
    fn width_parses_only_supported_values() {
        assert_eq!("1m".parse::<BucketWidth>().unwrap(), BucketWidth::OneMinute);
        assert_eq!("5m".parse::<BucketWidth>().unwrap(), BucketWidth::FiveMinute);
        assert!(matches!(
            "15m".parse::<BucketWidth>(),
            Err(DataError::UnsupportedBucket(_))
        ));
        assert_eq!(BucketWidth::FiveMinute.to_string(), "5m");
    }
}
