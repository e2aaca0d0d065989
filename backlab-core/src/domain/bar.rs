//! Bar and BarSeries, the basic market data units.

use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar at a single instant.
///
/// Timestamps are naive and expressed in UTC. Prices are positive and finite
/// once a bar has gone through normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// True when every price is finite and strictly positive and volume is non-negative.
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
    }

    /// Value of a single field.
    pub fn field(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Volume => self.volume,
        }
    }
}

/// One of the five numeric bar columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        }
    }
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "close" => Ok(Self::Close),
            "volume" => Ok(Self::Volume),
            other => Err(other.to_string()),
        }
    }
}

/// Structural problems with a bar sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar series is empty")]
    Empty,
    #[error("timestamps not strictly increasing at index {index}")]
    NotIncreasing { index: usize },
    #[error("bar at index {index} has a non-positive or non-finite price or negative volume")]
    InvalidBar { index: usize },
}

/// Canonical bar series: non-empty, sorted ascending, unique timestamps.
///
/// The constructor is the only way in, so every `BarSeries` in the system
/// satisfies the ordering invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(SeriesError::NotIncreasing { index: pos + 1 });
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// The trailing `n` bars. Returns a full copy when `n` covers the series
    /// and at least one bar when `n` is zero.
    pub fn tail(&self, n: usize) -> BarSeries {
        let keep = n.clamp(1, self.bars.len());
        Self {
            bars: self.bars[self.bars.len() - keep..].to_vec(),
        }
    }

    /// Extract one column as a dense vector.
    pub fn field(&self, field: PriceField) -> Vec<f64> {
        self.bars.iter().map(|b| b.field(field)).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.field(PriceField::Close)
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    /// Median spacing between consecutive bars, or `None` for a single bar.
    pub fn median_spacing(&self) -> Option<Duration> {
        if self.bars.len() < 2 {
            return None;
        }
        let mut gaps: Vec<i64> = self
            .bars
            .windows(2)
            .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
            .collect();
        gaps.sort_unstable();
        Some(Duration::seconds(gaps[gaps.len() / 2]))
    }

    /// BLAKE3 hash over every bar, hex encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for bar in &self.bars {
            hasher.update(&bar.timestamp.and_utc().timestamp_micros().to_le_bytes());
            for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl<'de> Deserialize<'de> for BarSeries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            bars: Vec<Bar>,
        }
        let raw = Raw::deserialize(deserializer)?;
        if let Some(index) = raw.bars.iter().position(|b| !b.is_valid()) {
            return Err(serde::de::Error::custom(SeriesError::InvalidBar { index }));
        }
        BarSeries::new(raw.bars).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar_at(day: u32, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn rejects_empty_series() {
        assert_eq!(BarSeries::new(vec![]), Err(SeriesError::Empty));
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let err = BarSeries::new(vec![bar_at(2, 10.0), bar_at(2, 11.0)]).unwrap_err();
        assert_eq!(err, SeriesError::NotIncreasing { index: 1 });
    }

    #[test]
    fn rejects_descending_timestamps() {
        let err = BarSeries::new(vec![bar_at(3, 10.0), bar_at(2, 11.0)]).unwrap_err();
        assert_eq!(err, SeriesError::NotIncreasing { index: 1 });
    }

    #[test]
    fn tail_keeps_last_bars() {
        let series =
            BarSeries::new(vec![bar_at(2, 1.0), bar_at(3, 2.0), bar_at(4, 3.0)]).unwrap();
        let tail = series.tail(2);
        assert_eq!(tail.closes(), vec![2.0, 3.0]);
        assert_eq!(series.tail(10).len(), 3);
        assert_eq!(series.tail(0).len(), 1);
    }

    #[test]
    fn median_spacing_is_daily() {
        let series =
            BarSeries::new(vec![bar_at(2, 1.0), bar_at(3, 2.0), bar_at(4, 3.0)]).unwrap();
        assert_eq!(series.median_spacing(), Some(Duration::days(1)));
    }

    #[test]
    fn content_hash_changes_with_prices() {
        let a = BarSeries::new(vec![bar_at(2, 1.0)]).unwrap();
        let b = BarSeries::new(vec![bar_at(2, 1.5)]).unwrap();
        assert_eq!(a.content_hash(), a.clone().content_hash());
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn price_field_parses_case_insensitively() {
        assert_eq!(" Close ".parse::<PriceField>(), Ok(PriceField::Close));
        assert_eq!("VOLUME".parse::<PriceField>(), Ok(PriceField::Volume));
        assert!("vwap".parse::<PriceField>().is_err());
    }

    #[test]
    fn invalid_bar_detected() {
        let mut bar = bar_at(2, 10.0);
        assert!(bar.is_valid());
        bar.low = 0.0;
        assert!(!bar.is_valid());
        bar.low = f64::NAN;
        assert!(!bar.is_valid());
    }

    #[test]
    fn deserialize_enforces_ordering() {
        let json = r#"{"bars":[
            {"timestamp":"2024-01-03T00:00:00","open":1.0,"high":1.0,"low":1.0,"close":1.0,"volume":0.0},
            {"timestamp":"2024-01-02T00:00:00","open":1.0,"high":1.0,"low":1.0,"close":1.0,"volume":0.0}
        ]}"#;
        assert!(serde_json::from_str::<BarSeries>(json).is_err());
    }

    #[test]
    fn deserialize_rejects_invalid_bars() {
        let json = r#"{"bars":[
            {"timestamp":"2024-01-02T00:00:00","open":1.0,"high":1.0,"low":1.0,"close":1.0,"volume":0.0},
            {"timestamp":"2024-01-03T00:00:00","open":1.0,"high":1.0,"low":1.0,"close":0.0,"volume":0.0}
        ]}"#;
        let err = serde_json::from_str::<BarSeries>(json).unwrap_err();
        assert!(err.to_string().contains("index 1"));

        let ok = json.replace("\"close\":0.0", "\"close\":1.0");
        assert_eq!(serde_json::from_str::<BarSeries>(&ok).unwrap().len(), 2);
    }
}
