//! Strategy that never trades. Baseline for accounting checks.

use super::{BarContext, Decision, ParamDecl, ParamSet, Strategy, StrategyError, StrategyTemplate};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullStrategy;

impl StrategyTemplate for NullStrategy {
    fn key(&self) -> &str {
        "null"
    }

    fn name(&self) -> &str {
        "No Trades"
    }

    fn params(&self) -> Vec<ParamDecl> {
        Vec::new()
    }

    fn build(&self, _params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
        Ok(Box::new(NullRun))
    }
}

struct NullRun;

impl Strategy for NullRun {
    fn decide(&mut self, _ctx: &BarContext<'_>) -> Result<Decision, StrategyError> {
        Ok(Decision::Hold)
    }
}
