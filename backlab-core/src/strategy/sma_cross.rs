//! SMA crossover: enter long on a golden cross, exit on a death cross.
//!
//! Entry size is `risk_pct` percent of current cash, at least one unit.

use crate::indicators::{IndicatorKind, IndicatorSpec};

use super::{
    crossed_above, crossed_below, period_param, BarContext, Decision, ParamDecl, ParamSet,
    Sizing, Strategy, StrategyError, StrategyTemplate,
};

const FAST_ID: &str = "sma_fast";
const SLOW_ID: &str = "sma_slow";

/// Template for the SMA crossover strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmaCross;

impl StrategyTemplate for SmaCross {
    fn key(&self) -> &str {
        "sma_cross"
    }

    fn name(&self) -> &str {
        "SMA Crossover"
    }

    fn description(&self) -> &str {
        "Simple moving average crossover baseline strategy."
    }

    fn params(&self) -> Vec<ParamDecl> {
        vec![
            ParamDecl::int("fast_period", 10),
            ParamDecl::int("slow_period", 30),
            ParamDecl::float("risk_pct", 1.0),
        ]
    }

    fn indicators(&self) -> Vec<IndicatorSpec> {
        vec![
            IndicatorSpec::new(FAST_ID, IndicatorKind::Sma)
                .with_period_param("fast_period")
                .with_label("Fast SMA")
                .with_color("#ffd166"),
            IndicatorSpec::new(SLOW_ID, IndicatorKind::Sma)
                .with_period_param("slow_period")
                .with_label("Slow SMA")
                .with_color("#60a5fa"),
        ]
    }

    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
        let fast = period_param(params, "fast_period")?;
        let slow = period_param(params, "slow_period")?;
        if fast >= slow {
            return Err(StrategyError::InvalidParam {
                name: "fast_period".into(),
                reason: format!("must be < slow_period ({fast} >= {slow})"),
            });
        }
        let risk_pct = params.get_f64("risk_pct").unwrap_or(1.0);
        if !(risk_pct > 0.0 && risk_pct <= 100.0) {
            return Err(StrategyError::InvalidParam {
                name: "risk_pct".into(),
                reason: format!("must be in (0, 100], got {risk_pct}"),
            });
        }
        Ok(Box::new(SmaCrossRun { risk_pct }))
    }
}

struct SmaCrossRun {
    risk_pct: f64,
}

impl Strategy for SmaCrossRun {
    fn decide(&mut self, ctx: &BarContext<'_>) -> Result<Decision, StrategyError> {
        let (Some(fast), Some(slow), Some(prev_fast), Some(prev_slow)) = (
            ctx.indicator(FAST_ID),
            ctx.indicator(SLOW_ID),
            ctx.prev_indicator(FAST_ID),
            ctx.prev_indicator(SLOW_ID),
        ) else {
            return Ok(Decision::Hold);
        };

        if ctx.is_flat() && crossed_above(prev_fast, prev_slow, fast, slow) {
            return Ok(Decision::EnterLong(Sizing::CashFraction(self.risk_pct / 100.0)));
        }
        if !ctx.is_flat() && crossed_below(prev_fast, prev_slow, fast, slow) {
            return Ok(Decision::ExitLong);
        }
        Ok(Decision::Hold)
    }
}
