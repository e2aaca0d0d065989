//! SMA 9/20/50 pullback.
//!
//! 1. Trend filter: SMA20 above SMA50. When it fails the pullback flag resets.
//! 2. A close below SMA9 while the trend holds marks a pullback.
//! 3. After a pullback, a close crossing above SMA9 buys one unit.
//! 4. While long, a close crossing below SMA20 exits.

use crate::indicators::{IndicatorKind, IndicatorSpec};

use super::{
    crossed_above, crossed_below, period_param, BarContext, Decision, ParamDecl, ParamSet,
    Sizing, Strategy, StrategyError, StrategyTemplate,
};

const SMA9: &str = "sma9";
const SMA20: &str = "sma20";
const SMA50: &str = "sma50";

#[derive(Debug, Clone, Copy, Default)]
pub struct SmaPullback;

impl StrategyTemplate for SmaPullback {
    fn key(&self) -> &str {
        "sma_pullback"
    }

    fn name(&self) -> &str {
        "SMA Pullback 9/20 with 20>50 Filter"
    }

    fn description(&self) -> &str {
        "Trend filter: SMA20 > SMA50. Entry on first pullback below SMA9, \
         then buy when Close crosses SMA9 upward. Exit when Close crosses SMA20 downward."
    }

    fn params(&self) -> Vec<ParamDecl> {
        vec![
            ParamDecl::int("sma9_period", 9),
            ParamDecl::int("sma20_period", 20),
            ParamDecl::int("sma50_period", 50),
            ParamDecl::float("risk_pct", 1.0),
        ]
    }

    fn indicators(&self) -> Vec<IndicatorSpec> {
        vec![
            IndicatorSpec::new(SMA9, IndicatorKind::Sma)
                .with_period_param("sma9_period")
                .with_label("SMA 9")
                .with_color("#facc15"),
            IndicatorSpec::new(SMA20, IndicatorKind::Sma)
                .with_period_param("sma20_period")
                .with_label("SMA 20")
                .with_color("#60a5fa"),
            IndicatorSpec::new(SMA50, IndicatorKind::Sma)
                .with_period_param("sma50_period")
                .with_label("SMA 50")
                .with_color("#ef4444"),
        ]
    }

    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
        for name in ["sma9_period", "sma20_period", "sma50_period"] {
            period_param(params, name)?;
        }
        Ok(Box::new(SmaPullbackRun {
            pullback_seen: false,
        }))
    }
}

struct SmaPullbackRun {
    pullback_seen: bool,
}

impl Strategy for SmaPullbackRun {
    fn decide(&mut self, ctx: &BarContext<'_>) -> Result<Decision, StrategyError> {
        let close = ctx.bar().close;
        let prev_close = ctx.prev_bar().map(|b| b.close);

        if !ctx.is_flat() {
            let exit = match (prev_close, ctx.prev_indicator(SMA20), ctx.indicator(SMA20)) {
                (Some(pc), Some(prev20), Some(cur20)) => crossed_below(pc, prev20, close, cur20),
                _ => false,
            };
            return Ok(if exit { Decision::ExitLong } else { Decision::Hold });
        }

        let (Some(sma9), Some(sma20), Some(sma50)) =
            (ctx.indicator(SMA9), ctx.indicator(SMA20), ctx.indicator(SMA50))
        else {
            self.pullback_seen = false;
            return Ok(Decision::Hold);
        };

        if sma20 <= sma50 {
            self.pullback_seen = false;
            return Ok(Decision::Hold);
        }

        if close < sma9 {
            self.pullback_seen = true;
        }

        let crossed_up = match (prev_close, ctx.prev_indicator(SMA9)) {
            (Some(pc), Some(prev9)) => crossed_above(pc, prev9, close, sma9),
            _ => false,
        };
        if self.pullback_seen && crossed_up {
            self.pullback_seen = false;
            return Ok(Decision::EnterLong(Sizing::Units(1)));
        }
        Ok(Decision::Hold)
    }
}
