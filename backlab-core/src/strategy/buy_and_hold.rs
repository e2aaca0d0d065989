//! Buy on the first bar with a close, hold to the end.

use super::{
    BarContext, Decision, ParamDecl, ParamSet, Sizing, Strategy, StrategyError, StrategyTemplate,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAndHold;

impl StrategyTemplate for BuyAndHold {
    fn key(&self) -> &str {
        "buy_and_hold"
    }

    fn name(&self) -> &str {
        "Buy and Hold"
    }

    fn description(&self) -> &str {
        "Invests a fixed share of cash on the first bar and never sells."
    }

    fn params(&self) -> Vec<ParamDecl> {
        vec![ParamDecl::float("allocation_pct", 100.0).with_range(10.0, 100.0)]
    }

    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
        let pct = params.get_f64("allocation_pct").unwrap_or(100.0);
        if !(pct > 0.0 && pct <= 100.0) {
            return Err(StrategyError::InvalidParam {
                name: "allocation_pct".into(),
                reason: format!("must be in (0, 100], got {pct}"),
            });
        }
        Ok(Box::new(BuyAndHoldRun {
            fraction: pct / 100.0,
        }))
    }
}

struct BuyAndHoldRun {
    fraction: f64,
}

impl Strategy for BuyAndHoldRun {
    fn decide(&mut self, ctx: &BarContext<'_>) -> Result<Decision, StrategyError> {
        if ctx.is_flat() {
            Ok(Decision::EnterLong(Sizing::CashFraction(self.fraction)))
        } else {
            Ok(Decision::Hold)
        }
    }
}
