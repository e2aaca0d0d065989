//! Single-position simulation engine.
//!
//! Consumes a canonical bar series and a strategy, produces a [`Trace`]:
//! one equity point per bar, the fills, and the final account.

pub mod accounting;
pub mod loop_runner;
pub mod state;
pub mod trace;

pub use loop_runner::{precompute_indicators, run, run_strategy};
pub use state::{EngineConfig, DEFAULT_COMMISSION_RATE, DEFAULT_STARTING_CASH};
pub use trace::{EquityPoint, Trace};

use thiserror::Error;

use crate::indicators::IndicatorError;
use crate::strategy::StrategyError;

/// Structural simulation failures. Strategy errors abort the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("bar series is empty")]
    EmptySeries,

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("strategy failed at bar {bar_index}: {source}")]
    Decision {
        bar_index: usize,
        source: StrategyError,
    },

    #[error("indicator '{id}' failed: {source}")]
    Indicator { id: String, source: IndicatorError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarSeries, Side};
    use crate::indicators::{compute_all, make_bars, IndicatorKind, IndicatorSpec, IndicatorValues};
    use crate::strategy::{
        BarContext, BuyAndHold, Decision, NullStrategy, ParamSet, ParamValue, SmaCross, Sizing,
        Strategy, StrategyTemplate,
    };

    fn series(closes: &[f64]) -> BarSeries {
        BarSeries::new(make_bars(closes)).unwrap()
    }

    /// Plays back a fixed list of decisions.
    struct Script(Vec<Decision>);

    impl Strategy for Script {
        fn decide(&mut self, ctx: &BarContext<'_>) -> Result<Decision, StrategyError> {
            Ok(self.0.get(ctx.index).copied().unwrap_or(Decision::Hold))
        }
    }

    struct Failing;

    impl Strategy for Failing {
        fn decide(&mut self, ctx: &BarContext<'_>) -> Result<Decision, StrategyError> {
            if ctx.index == 2 {
                Err(StrategyError::Decision {
                    bar_index: ctx.index,
                    reason: "boom".into(),
                })
            } else {
                Ok(Decision::Hold)
            }
        }
    }

    #[test]
    fn null_strategy_keeps_cash() {
        let s = series(&[10.0, 11.0, 12.0]);
        let trace = run(&s, &NullStrategy, &ParamSet::new(), &EngineConfig::default()).unwrap();
        assert_eq!(trace.bar_count(), 3);
        assert!(trace.fills.is_empty());
        assert_eq!(trace.final_value(), 10_000.0);
    }

    #[test]
    fn equity_recorded_before_decision() {
        let s = series(&[100.0, 110.0, 120.0]);
        let mut strat = Script(vec![
            Decision::EnterLong(Sizing::Units(10)),
            Decision::Hold,
            Decision::ExitLong,
        ]);
        let config = EngineConfig::new(10_000.0, 0.0);
        let trace = run_strategy(&s, &mut strat, &IndicatorValues::new(), &config).unwrap();

        let values = trace.equity_values();
        // bar 0 recorded before the buy
        assert_eq!(values[0], 10_000.0);
        // bar 1: 9000 cash + 10 * 110
        assert_eq!(values[1], 10_100.0);
        // bar 2: recorded before the sell, marked at 120
        assert_eq!(values[2], 10_200.0);
        assert_eq!(trace.fills.len(), 2);
        assert_eq!(trace.fills[1].side, Side::Sell);
        assert!((trace.final_account.cash - 10_200.0).abs() < 1e-9);
    }

    #[test]
    fn conflicting_decisions_ignored() {
        let s = series(&[100.0, 100.0, 100.0, 100.0]);
        let mut strat = Script(vec![
            Decision::ExitLong,
            Decision::EnterLong(Sizing::Units(1)),
            Decision::EnterLong(Sizing::Units(1)),
            Decision::Hold,
        ]);
        let trace = run_strategy(
            &s,
            &mut strat,
            &IndicatorValues::new(),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(trace.fills.len(), 1);
        assert_eq!(trace.fills[0].bar_index, 1);
        assert!(trace.ends_in_position());
    }

    #[test]
    fn strategy_error_aborts_with_bar_index() {
        let s = series(&[1.0, 2.0, 3.0, 4.0]);
        let err = run_strategy(
            &s,
            &mut Failing,
            &IndicatorValues::new(),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::Decision { bar_index: 2, .. }));
    }

    #[test]
    fn invalid_params_surface_as_strategy_error() {
        let s = series(&[1.0, 2.0, 3.0]);
        let mut params = ParamSet::from_decls(&SmaCross.params());
        params.insert("fast_period", ParamValue::Int(40));
        let err = run(&s, &SmaCross, &params, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, SimulationError::Strategy(_)));
    }

    #[test]
    fn invalid_config_rejected() {
        let s = series(&[1.0]);
        let err = run(&s, &NullStrategy, &ParamSet::new(), &EngineConfig::new(-1.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(_)));
    }

    #[test]
    fn buy_and_hold_marks_to_market() {
        let s = series(&[10.0, 20.0]);
        let params = ParamSet::from_decls(&BuyAndHold.params());
        let trace = run(&s, &BuyAndHold, &params, &EngineConfig::new(1_000.0, 0.0)).unwrap();
        assert_eq!(trace.fills[0].quantity, 100);
        assert_eq!(trace.final_value(), 2_000.0);
    }

    #[test]
    fn round_trips_pair_fills() {
        let s = series(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let mut strat = Script(vec![
            Decision::EnterLong(Sizing::Units(1)),
            Decision::ExitLong,
            Decision::EnterLong(Sizing::Units(1)),
            Decision::ExitLong,
            Decision::EnterLong(Sizing::Units(1)),
        ]);
        let trace = run_strategy(
            &s,
            &mut strat,
            &IndicatorValues::new(),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(trace.round_trips().len(), 2);
        assert!(trace.ends_in_position());
    }

    #[test]
    fn context_never_exposes_future_bars() {
        struct Peek;
        impl Strategy for Peek {
            fn decide(&mut self, ctx: &BarContext<'_>) -> Result<Decision, StrategyError> {
                assert_eq!(ctx.bars.len(), ctx.index + 1);
                Ok(Decision::Hold)
            }
        }
        let s = series(&[1.0, 2.0, 3.0]);
        run_strategy(&s, &mut Peek, &IndicatorValues::new(), &EngineConfig::default()).unwrap();
    }

    /// Declares an indicator that can never be computed.
    struct BrokenInputs;

    impl StrategyTemplate for BrokenInputs {
        fn key(&self) -> &str {
            "broken_inputs"
        }

        fn name(&self) -> &str {
            "Broken inputs"
        }

        fn params(&self) -> Vec<crate::strategy::ParamDecl> {
            Vec::new()
        }

        fn indicators(&self) -> Vec<IndicatorSpec> {
            vec![IndicatorSpec::new("bad", IndicatorKind::Sma).with_period(0)]
        }

        fn build(&self, _params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
            Ok(Box::new(Script(Vec::new())))
        }
    }

    #[test]
    fn failing_required_indicator_aborts_run_but_chart_degrades() {
        let s = series(&[1.0, 2.0, 3.0]);
        let err = run(&s, &BrokenInputs, &ParamSet::new(), &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, SimulationError::Indicator { ref id, .. } if id == "bad"));

        let bundle = compute_all(&s, &BrokenInputs.indicators(), &ParamSet::new());
        assert!(bundle.series.is_empty());
        assert_eq!(bundle.warnings.len(), 1);
        assert!(bundle.warnings[0].starts_with("bad: "));
    }
}
