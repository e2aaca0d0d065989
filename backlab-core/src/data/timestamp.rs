//! Timestamp coercion for heterogeneous time columns.
//!
//! Every accepted representation collapses to a naive UTC `NaiveDateTime`.
//! Values that cannot be parsed become `None` and are dropped by the caller.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::data::DataError;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a textual timestamp.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    let naive = s.strip_suffix('Z').unwrap_or(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(naive, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // Bare numbers in a text column are epoch values.
    naive.parse::<f64>().ok().and_then(from_epoch)
}

/// Convert an epoch number to a timestamp, inferring the unit from magnitude.
///
/// Below 1e11 is seconds, below 1e14 milliseconds, below 1e17 microseconds,
/// anything larger nanoseconds.
pub fn from_epoch(value: f64) -> Option<NaiveDateTime> {
    if !value.is_finite() {
        return None;
    }
    let magnitude = value.abs();
    let micros = if magnitude < 1e11 {
        value * 1e6
    } else if magnitude < 1e14 {
        value * 1e3
    } else if magnitude < 1e17 {
        value
    } else {
        value / 1e3
    };
    from_micros(micros.round() as i64)
}

pub(crate) fn from_micros(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

pub(crate) fn to_micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

/// Coerce a whole polars column to optional timestamps.
pub fn coerce_column(column: &Column) -> Result<Vec<Option<NaiveDateTime>>, DataError> {
    let dtype = column.dtype().clone();
    let values = match dtype {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_timestamp))
            .collect(),
        DataType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| DataError::InvalidData("epoch out of range".into()))?;
            let days = column.cast(&DataType::Int32)?;
            days.i32()?
                .into_iter()
                .map(|v| v.and_then(|d| epoch.checked_add_signed(chrono::Duration::days(d as i64))))
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let raw = column.cast(&DataType::Int64)?;
            raw.i64()?
                .into_iter()
                .map(|v| {
                    v.and_then(|x| match unit {
                        TimeUnit::Nanoseconds => from_micros(x.div_euclid(1_000)),
                        TimeUnit::Microseconds => from_micros(x),
                        TimeUnit::Milliseconds => from_micros(x.saturating_mul(1_000)),
                    })
                })
                .collect()
        }
        ref dt if dt.is_integer() || dt.is_float() => {
            let raw = column.cast(&DataType::Float64)?;
            raw.f64()?
                .into_iter()
                .map(|v| v.and_then(from_epoch))
                .collect()
        }
        other => {
            return Err(DataError::InvalidData(format!(
                "unsupported timestamp column type {other}"
            )))
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_plain_date() {
        assert_eq!(parse_timestamp("2024-03-01"), Some(ymd_hms(2024, 3, 1, 0, 0, 0)));
        assert_eq!(parse_timestamp("03/01/2024"), Some(ymd_hms(2024, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn parses_naive_datetime() {
        assert_eq!(
            parse_timestamp("2024-03-01 09:30:00"),
            Some(ymd_hms(2024, 3, 1, 9, 30, 0))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T09:30"),
            Some(ymd_hms(2024, 3, 1, 9, 30, 0))
        );
    }

    #[test]
    fn offset_is_converted_to_utc() {
        assert_eq!(
            parse_timestamp("2024-03-01T09:30:00-05:00"),
            Some(ymd_hms(2024, 3, 1, 14, 30, 0))
        );
        assert_eq!(
            parse_timestamp("2024-03-01 09:30:00+01:00"),
            Some(ymd_hms(2024, 3, 1, 8, 30, 0))
        );
    }

    #[test]
    fn trailing_z_is_utc() {
        assert_eq!(
            parse_timestamp("2024-03-01T09:30:00Z"),
            Some(ymd_hms(2024, 3, 1, 9, 30, 0))
        );
    }

    #[test]
    fn fractional_seconds_kept() {
        let ts = parse_timestamp("2024-03-01 09:30:00.250").unwrap();
        assert_eq!(ts.nanosecond(), 250_000_000);
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("   "), None);
    }

    #[test]
    fn epoch_units_inferred() {
        let expected = ymd_hms(2024, 1, 1, 0, 0, 0);
        assert_eq!(from_epoch(1_704_067_200.0), Some(expected));
        assert_eq!(from_epoch(1_704_067_200_000.0), Some(expected));
        assert_eq!(from_epoch(1_704_067_200_000_000.0), Some(expected));
        assert_eq!(from_epoch(1_704_067_200_000_000_000.0), Some(expected));
        assert_eq!(from_epoch(f64::NAN), None);
    }

    #[test]
    fn numeric_text_is_epoch() {
        assert_eq!(
            parse_timestamp("1704067200"),
            Some(ymd_hms(2024, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn coerces_integer_column() {
        let column = Column::new("ts".into(), &[1_704_067_200i64, 1_704_153_600]);
        let out = coerce_column(&column).unwrap();
        assert_eq!(out[0], Some(ymd_hms(2024, 1, 1, 0, 0, 0)));
        assert_eq!(out[1], Some(ymd_hms(2024, 1, 2, 0, 0, 0)));
    }

    #[test]
    fn coerces_string_column_with_nulls() {
        let column = Column::new("ts".into(), &[Some("2024-01-01"), None, Some("bad")]);
        let out = coerce_column(&column).unwrap();
        assert_eq!(out, vec![Some(ymd_hms(2024, 1, 1, 0, 0, 0)), None, None]);
    }
}
