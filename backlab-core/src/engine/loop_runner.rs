//! Bar loop. Strictly sequential over the sorted series.
//!
//! Per bar:
//! 1. Record equity marked at this bar's close.
//! 2. Ask the strategy for a decision, with state as of the start of the bar.
//! 3. Apply at most one fill at this bar's close.

use tracing::{debug, trace};

use crate::domain::{Account, BarSeries};
use crate::indicators::{compute_dense, IndicatorValues};
use crate::rounding::money;
use crate::strategy::{BarContext, Decision, ParamSet, Strategy, StrategyTemplate};

use super::accounting;
use super::state::EngineConfig;
use super::trace::{EquityPoint, Trace};
use super::SimulationError;

/// Precompute every indicator the template declares.
///
/// These are the strategy's inputs, so any failure is fatal here and surfaces
/// as [`SimulationError::Indicator`]. Chart output goes through
/// [`compute_all`](crate::indicators::compute_all) instead, which omits a
/// failing indicator and reports a warning.
pub fn precompute_indicators(
    series: &BarSeries,
    template: &dyn StrategyTemplate,
    params: &ParamSet,
) -> Result<IndicatorValues, SimulationError> {
    let mut values = IndicatorValues::new();
    for spec in template.indicators() {
        let dense = compute_dense(series, &spec, params).map_err(|source| {
            SimulationError::Indicator {
                id: spec.id.clone(),
                source,
            }
        })?;
        values.insert(spec.id.clone(), dense);
    }
    Ok(values)
}

/// Build the template with `params` and simulate it over `series`.
pub fn run(
    series: &BarSeries,
    template: &dyn StrategyTemplate,
    params: &ParamSet,
    config: &EngineConfig,
) -> Result<Trace, SimulationError> {
    config.validate()?;
    let indicators = precompute_indicators(series, template, params)?;
    let mut strategy = template.build(params)?;
    run_strategy(series, strategy.as_mut(), &indicators, config)
}

/// Simulate an already-built strategy against precomputed indicators.
pub fn run_strategy(
    series: &BarSeries,
    strategy: &mut dyn Strategy,
    indicators: &IndicatorValues,
    config: &EngineConfig,
) -> Result<Trace, SimulationError> {
    config.validate()?;
    let bars = series.bars();
    if bars.is_empty() {
        return Err(SimulationError::EmptySeries);
    }

    let mut account = Account::new(config.starting_cash, config.commission_rate);
    let mut equity = Vec::with_capacity(bars.len());
    let mut fills = Vec::new();

    for (i, bar) in bars.iter().enumerate() {
        equity.push(EquityPoint {
            timestamp: bar.timestamp,
            value: money(account.value_at(bar.close)),
        });

        let ctx = BarContext {
            bars: &bars[..=i],
            index: i,
            indicators,
            position: account.position.quantity,
            cash: account.cash,
        };
        let decision = strategy
            .decide(&ctx)
            .map_err(|source| SimulationError::Decision { bar_index: i, source })?;

        let fill = match decision {
            Decision::Hold => None,
            Decision::EnterLong(sizing) if account.is_flat() => {
                let fill = accounting::buy(&mut account, i, bar, sizing);
                if fill.is_none() {
                    debug!(bar_index = i, cash = account.cash, "entry rejected: insufficient cash");
                }
                fill
            }
            Decision::ExitLong if !account.is_flat() => accounting::sell(&mut account, i, bar),
            // Conflicts with the current position state.
            _ => None,
        };
        if let Some(fill) = fill {
            trace!(bar_index = i, side = ?fill.side, qty = fill.quantity, price = fill.price, "fill");
            fills.push(fill);
        }
    }

    Ok(Trace {
        equity,
        fills,
        final_account: account,
    })
}
