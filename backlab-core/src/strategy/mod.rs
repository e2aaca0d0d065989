//! Strategy contract.
//!
//! A strategy comes in two halves:
//! - [`StrategyTemplate`]: the stateless definition. Declares parameters and
//!   indicators and builds a runnable instance from a parameter set.
//! - [`Strategy`]: one instance per run. Sees the bars up to the current one,
//!   precomputed indicators, position and cash, and returns a [`Decision`].
//!
//! Templates are looked up by stable key in a [`StrategyRegistry`].

pub mod buy_and_hold;
pub mod null;
pub mod params;
pub mod registry;
pub mod sma_cross;
pub mod sma_pullback;

pub use buy_and_hold::BuyAndHold;
pub use null::NullStrategy;
pub use params::{
    resolve_params, ParamDecl, ParamKind, ParamRange, ParamSet, ParamValue, ResolvedParams,
};
pub use registry::StrategyRegistry;
pub use sma_cross::SmaCross;
pub use sma_pullback::SmaPullback;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Bar;
use crate::indicators::{IndicatorSpec, IndicatorValues};

/// Errors raised by strategy lookup, construction or decisions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("decision failed at bar {bar_index}: {reason}")]
    Decision { bar_index: usize, reason: String },
}

/// How big an entry should be.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sizing {
    /// Fraction of current cash, converted to whole units at the bar close.
    CashFraction(f64),
    /// Fixed unit count.
    Units(u64),
}

/// Per-bar output of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Hold,
    EnterLong(Sizing),
    ExitLong,
}

/// Everything a strategy may look at on one bar.
///
/// `bars` ends at the current bar, so nothing after it is reachable.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub bars: &'a [Bar],
    pub index: usize,
    pub indicators: &'a IndicatorValues,
    pub position: u64,
    pub cash: f64,
}

impl<'a> BarContext<'a> {
    pub fn bar(&self) -> &'a Bar {
        &self.bars[self.index]
    }

    pub fn prev_bar(&self) -> Option<&'a Bar> {
        self.index.checked_sub(1).map(|i| &self.bars[i])
    }

    pub fn is_flat(&self) -> bool {
        self.position == 0
    }

    /// Indicator value on the current bar.
    pub fn indicator(&self, id: &str) -> Option<f64> {
        self.indicators.get(id, self.index)
    }

    /// Indicator value on the previous bar.
    pub fn prev_indicator(&self, id: &str) -> Option<f64> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.indicators.get(id, i))
    }
}

/// Runnable strategy instance. May keep state across bars.
pub trait Strategy: Send {
    fn decide(&mut self, ctx: &BarContext<'_>) -> Result<Decision, StrategyError>;
}

/// Stateless strategy definition.
pub trait StrategyTemplate: Send + Sync {
    /// Stable registry key, e.g. "sma_cross".
    fn key(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Declared numeric parameters with defaults.
    fn params(&self) -> Vec<ParamDecl>;

    /// Indicators the strategy reads, keyed by spec id.
    fn indicators(&self) -> Vec<IndicatorSpec> {
        Vec::new()
    }

    /// Build a run instance. Parameter invariants are checked here.
    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError>;
}

/// Read a declared integer parameter as a period (>= 1).
pub(crate) fn period_param(params: &ParamSet, name: &str) -> Result<usize, StrategyError> {
    let value = params.get_i64(name).ok_or_else(|| StrategyError::InvalidParam {
        name: name.to_string(),
        reason: "missing".into(),
    })?;
    if value < 1 {
        return Err(StrategyError::InvalidParam {
            name: name.to_string(),
            reason: format!("must be >= 1, got {value}"),
        });
    }
    Ok(value as usize)
}

/// Upward cross: `a` was at or below `b` on the previous bar and is above it now.
pub(crate) fn crossed_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    a > b && prev_a <= prev_b
}

/// Downward cross: `a` was at or above `b` on the previous bar and is below it now.
pub(crate) fn crossed_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    a < b && prev_a >= prev_b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_detection() {
        assert!(crossed_above(1.0, 2.0, 3.0, 2.5));
        assert!(crossed_above(2.0, 2.0, 3.0, 2.5));
        assert!(!crossed_above(3.0, 2.0, 3.0, 2.5));
        assert!(crossed_below(3.0, 2.0, 1.0, 2.0));
        assert!(!crossed_below(1.0, 2.0, 1.0, 2.0));
    }

    #[test]
    fn period_param_validation() {
        let mut params = ParamSet::new();
        params.insert("p", ParamValue::Int(0));
        assert!(matches!(
            period_param(&params, "p"),
            Err(StrategyError::InvalidParam { .. })
        ));
        params.insert("p", ParamValue::Int(7));
        assert_eq!(period_param(&params, "p").unwrap(), 7);
        assert!(period_param(&params, "q").is_err());
    }
}
