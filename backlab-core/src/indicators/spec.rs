//! Indicator specifications and chart-facing computation.
//!
//! A spec names an indicator kind, a source field and a period. The period is
//! either fixed or read from a strategy parameter. Computation returns a
//! sparse timestamped series: undefined values are left out, not zero-filled.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::{BarSeries, PriceField};
use crate::indicators::indicator::Indicator;
use crate::indicators::rsi::DEFAULT_RSI_PERIOD;
use crate::indicators::{Ema, Rsi, Sma, Wma};
use crate::strategy::ParamSet;

/// Errors from a single indicator spec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("unsupported indicator type '{0}'")]
    UnsupportedIndicator(String),

    #[error("missing source column '{0}'")]
    MissingSourceColumn(String),

    #[error("invalid period {period} for indicator '{id}'")]
    InvalidPeriod { id: String, period: i64 },
}

/// Supported indicator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Wma,
    Rsi,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Wma => "wma",
            Self::Rsi => "rsi",
        }
    }

    /// Build the indicator for a resolved period.
    pub fn build(&self, period: usize, source: PriceField) -> Box<dyn Indicator> {
        match self {
            Self::Sma => Box::new(Sma::new(period, source)),
            Self::Ema => Box::new(Ema::new(period, source)),
            Self::Wma => Box::new(Wma::new(period, source)),
            Self::Rsi => Box::new(Rsi::new(period, source)),
        }
    }
}

impl FromStr for IndicatorKind {
    type Err = IndicatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sma" => Ok(Self::Sma),
            "ema" => Ok(Self::Ema),
            "wma" => Ok(Self::Wma),
            "rsi" => Ok(Self::Rsi),
            _ => Err(IndicatorError::UnsupportedIndicator(s.to_string())),
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_source() -> String {
    "close".to_string()
}

/// Declarative indicator request, as a strategy or a chart asks for it.
///
/// `kind` and `source` stay textual so that bad values surface as
/// per-indicator errors at computation time rather than failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub period: Option<i64>,
    #[serde(default)]
    pub period_param: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl IndicatorSpec {
    pub fn new(id: impl Into<String>, kind: IndicatorKind) -> Self {
        Self {
            id: id.into(),
            kind: kind.as_str().to_string(),
            source: default_source(),
            period: None,
            period_param: None,
            label: None,
            color: None,
        }
    }

    pub fn with_period(mut self, period: i64) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_period_param(mut self, param: impl Into<String>) -> Self {
        self.period_param = Some(param.into());
        self
    }

    pub fn with_source(mut self, source: PriceField) -> Self {
        self.source = source.as_str().to_string();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn parsed_kind(&self) -> Result<IndicatorKind, IndicatorError> {
        self.kind.parse()
    }

    pub fn parsed_source(&self) -> Result<PriceField, IndicatorError> {
        self.source
            .parse()
            .map_err(|_| IndicatorError::MissingSourceColumn(self.source.clone()))
    }

    /// Resolve the period: the named parameter wins over the fixed period.
    ///
    /// A missing or non-positive period falls back to 14 for RSI and is an
    /// error for every other kind.
    pub fn resolve_period(&self, params: &ParamSet) -> Result<usize, IndicatorError> {
        let kind = self.parsed_kind()?;
        let raw = self
            .period_param
            .as_deref()
            .and_then(|name| params.get(name))
            .map(|v| v.as_f64().trunc() as i64)
            .or(self.period);

        match raw {
            Some(p) if p >= 1 => Ok(p as usize),
            _ if kind == IndicatorKind::Rsi => Ok(DEFAULT_RSI_PERIOD),
            other => Err(IndicatorError::InvalidPeriod {
                id: self.id.clone(),
                period: other.unwrap_or(0),
            }),
        }
    }

    /// Validate the spec and build the indicator.
    pub fn build(&self, params: &ParamSet) -> Result<Box<dyn Indicator>, IndicatorError> {
        let kind = self.parsed_kind()?;
        let source = self.parsed_source()?;
        let period = self.resolve_period(params)?;
        Ok(kind.build(period, source))
    }

    /// Display label, defaulting to e.g. `SMA(20)`.
    pub fn display_label(&self, period: usize) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("{}({period})", self.kind.trim().to_ascii_uppercase()))
    }
}

/// A single defined indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Sparse, timestamped indicator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub id: String,
    pub kind: IndicatorKind,
    pub period: usize,
    pub label: String,
    pub color: Option<String>,
    pub points: Vec<IndicatorPoint>,
}

/// Every successfully computed series plus one warning per failed spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub series: Vec<IndicatorSeries>,
    pub warnings: Vec<String>,
}

/// Dense output aligned with the bar series, `NaN` where undefined.
pub fn compute_dense(
    series: &BarSeries,
    spec: &IndicatorSpec,
    params: &ParamSet,
) -> Result<Vec<f64>, IndicatorError> {
    Ok(spec.build(params)?.compute(series.bars()))
}

/// Compute one spec as a sparse timestamped series.
pub fn compute(
    series: &BarSeries,
    spec: &IndicatorSpec,
    params: &ParamSet,
) -> Result<IndicatorSeries, IndicatorError> {
    let kind = spec.parsed_kind()?;
    let period = spec.resolve_period(params)?;
    let dense = compute_dense(series, spec, params)?;
    let points = series
        .bars()
        .iter()
        .zip(dense)
        .filter(|(_, v)| v.is_finite())
        .map(|(bar, value)| IndicatorPoint {
            timestamp: bar.timestamp,
            value,
        })
        .collect();

    Ok(IndicatorSeries {
        id: spec.id.clone(),
        kind,
        period,
        label: spec.display_label(period),
        color: spec.color.clone(),
        points,
    })
}

/// Compute every spec. A failing spec is skipped and reported as `"<id>: <error>"`.
pub fn compute_all(series: &BarSeries, specs: &[IndicatorSpec], params: &ParamSet) -> IndicatorBundle {
    let mut bundle = IndicatorBundle::default();
    for spec in specs {
        match compute(series, spec, params) {
            Ok(s) => bundle.series.push(s),
            Err(e) => {
                warn!(indicator = %spec.id, error = %e, "indicator skipped");
                bundle.warnings.push(format!("{}: {e}", spec.id));
            }
        }
    }
    bundle
}
