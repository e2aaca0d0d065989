//! Call contracts for the surrounding service.
//!
//! Three entry points, all pure over an already-normalized series:
//! - `run_backtest()`: one simulation plus analytics and chart data.
//! - `introspect_params()`: a strategy's declared parameters and ranges.
//! - `run_optimization()`: parameter search with best-trial replay.
//!
//! `run_from_config()` wires a TOML config and a series source into a backtest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use backlab_core::data::BarProvider;
use backlab_core::domain::{Bar, BarSeries};
use backlab_core::engine::{self, EngineConfig, SimulationError, Trace};
use backlab_core::indicators::{compute_all, IndicatorSeries, IndicatorSpec};
use backlab_core::strategy::{
    resolve_params, ParamKind, ParamSet, ParamValue, StrategyError, StrategyRegistry,
};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_series, LoadError};
use crate::metrics::{extract_trades, summarize, Summary, TradeRecord};
use crate::optimize::{self, OptimizationResult, OptimizeConfig, OptimizeError, RangeRequest, TpeConfig};
use crate::optimize::space::SearchSpace;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
    #[error("optimization error: {0}")]
    Optimize(#[from] OptimizeError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Current schema version for serialized reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Inputs of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub strategy: String,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Overrides by parameter name. Unknown names are reported, not applied.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl BacktestRequest {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            engine: EngineConfig::default(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_starting_cash(mut self, cash: f64) -> Self {
        self.engine.starting_cash = cash;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// Complete result of one backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// BLAKE3 over strategy, effective params, engine config and dataset hash.
    pub run_id: String,
    pub strategy: String,
    pub dataset_hash: String,
    pub engine: EngineConfig,
    pub params: ParamSet,
    pub ignored_params: Vec<String>,
    pub summary: Summary,
    pub trades: Vec<TradeRecord>,
    pub trace: Trace,
    pub bars: Vec<Bar>,
    pub indicators: Vec<IndicatorSeries>,
    /// Indicator id -> display label.
    pub indicator_labels: BTreeMap<String, String>,
    pub indicator_warnings: Vec<String>,
}

#[derive(Serialize)]
struct RunKey<'a> {
    strategy: &'a str,
    params: &'a ParamSet,
    engine: &'a EngineConfig,
    dataset_hash: &'a str,
}

/// Run one backtest over `series`.
pub fn run_backtest(
    registry: &StrategyRegistry,
    request: &BacktestRequest,
    series: &BarSeries,
) -> Result<BacktestReport, RunError> {
    let template = registry.get(&request.strategy)?;
    let resolved = resolve_params(&template.params(), &request.params);
    let trace = engine::run(series, template.as_ref(), &resolved.params, &request.engine)?;
    let summary = summarize(&trace, request.engine.starting_cash);

    let bundle = compute_all(series, &template.indicators(), &resolved.params);
    let indicator_labels = bundle
        .series
        .iter()
        .map(|s| (s.id.clone(), s.label.clone()))
        .collect();

    let dataset_hash = series.content_hash();
    let key = RunKey {
        strategy: template.key(),
        params: &resolved.params,
        engine: &request.engine,
        dataset_hash: &dataset_hash,
    };
    let run_id = blake3::hash(serde_json::to_string(&key)?.as_bytes())
        .to_hex()
        .to_string();

    info!(
        run_id = %run_id,
        strategy = template.key(),
        bars = series.len(),
        fills = trace.fills.len(),
        pnl = summary.performance.pnl,
        "backtest complete"
    );

    Ok(BacktestReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        strategy: template.key().to_string(),
        dataset_hash,
        engine: request.engine,
        params: resolved.params,
        ignored_params: resolved.ignored,
        trades: extract_trades(&trace),
        summary,
        trace,
        bars: series.bars().to_vec(),
        indicators: bundle.series,
        indicator_labels,
        indicator_warnings: bundle.warnings,
    })
}

/// One declared parameter as seen by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub default: ParamValue,
    /// Range the optimizer searches when no override is given.
    pub suggested_min: f64,
    pub suggested_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamIntrospection {
    pub key: String,
    pub name: String,
    pub description: String,
    /// Sorted by name.
    pub params: Vec<ParamInfo>,
    pub indicators: Vec<IndicatorSpec>,
}

/// Describe a strategy's parameters.
pub fn introspect_params(
    registry: &StrategyRegistry,
    strategy: &str,
) -> Result<ParamIntrospection, RunError> {
    let template = registry.get(strategy)?;
    let decls = template.params();
    let space = SearchSpace::build(&decls, &BTreeMap::new())?;

    let mut params: Vec<ParamInfo> = decls
        .iter()
        .zip(&space.params)
        .map(|(decl, range)| ParamInfo {
            name: decl.name.clone(),
            kind: decl.kind(),
            default: decl.default,
            suggested_min: range.low,
            suggested_max: range.high,
        })
        .collect();
    params.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(ParamIntrospection {
        key: template.key().to_string(),
        name: template.name().to_string(),
        description: template.description().to_string(),
        params,
        indicators: template.indicators(),
    })
}

/// Inputs of one optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub strategy: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub ranges: BTreeMap<String, RangeRequest>,
    #[serde(default = "default_objective_name")]
    pub objective: String,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_max_bars")]
    pub max_bars: usize,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_objective_name() -> String {
    "pnl".into()
}

fn default_trials() -> usize {
    optimize::DEFAULT_TRIALS
}

fn default_max_bars() -> usize {
    optimize::DEFAULT_MAX_BARS
}

fn default_parallel() -> bool {
    true
}

impl OptimizationRequest {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            engine: EngineConfig::default(),
            ranges: BTreeMap::new(),
            objective: default_objective_name(),
            trials: default_trials(),
            seed: None,
            max_bars: default_max_bars(),
            parallel: default_parallel(),
        }
    }

    pub fn with_range(mut self, name: impl Into<String>, min: f64, max: f64) -> Self {
        self.ranges.insert(name.into(), RangeRequest::new(min, max));
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = objective.into();
        self
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: String,
    #[serde(flatten)]
    pub result: OptimizationResult,
}

/// Search a strategy's parameters over `series`.
///
/// Fails fast on an unknown strategy, objective or bad range, before any
/// simulation runs.
pub fn run_optimization(
    registry: &StrategyRegistry,
    request: &OptimizationRequest,
    series: &BarSeries,
) -> Result<OptimizationReport, RunError> {
    let template = registry.get(&request.strategy)?;
    let config = OptimizeConfig {
        objective: request.objective.parse()?,
        trials: request.trials,
        seed: request.seed,
        max_bars: request.max_bars,
        parallel: request.parallel,
        tpe: TpeConfig::default(),
    };
    let result = optimize::search(
        series,
        template.as_ref(),
        &request.ranges,
        &config,
        &request.engine,
    )?;
    Ok(OptimizationReport {
        schema_version: SCHEMA_VERSION,
        strategy: template.key().to_string(),
        result,
    })
}

/// Load the configured series and run the configured backtest.
pub fn run_from_config(
    registry: &StrategyRegistry,
    config: &BacktestConfig,
    provider: Option<&dyn BarProvider>,
) -> Result<BacktestReport, RunError> {
    let source = config
        .series_source()?
        .ok_or_else(|| ConfigError::Invalid("a [data] section is required".into()))?;
    let loaded = load_series(&source, provider)?;
    let request = BacktestRequest {
        strategy: config.backtest.strategy.clone(),
        engine: config.engine_config()?,
        params: config.params.clone(),
    };
    run_backtest(registry, &request, &loaded.series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> BarSeries {
        let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1.0,
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    #[test]
    fn run_id_is_stable_and_param_sensitive() {
        let registry = StrategyRegistry::with_builtins();
        let s = series(&[10.0, 11.0, 12.0]);
        let req = BacktestRequest::new("buy_and_hold");
        let a = run_backtest(&registry, &req, &s).unwrap();
        let b = run_backtest(&registry, &req, &s).unwrap();
        assert_eq!(a.run_id, b.run_id);
        assert_eq!(a.run_id.len(), 64);

        let c = run_backtest(&registry, &req.clone().with_param("allocation_pct", 50.0), &s).unwrap();
        assert_ne!(a.run_id, c.run_id);
    }

    #[test]
    fn ignored_params_reported() {
        let registry = StrategyRegistry::with_builtins();
        let req = BacktestRequest::new("sma_cross")
            .with_param("fast_period", 3.0)
            .with_param("bogus", 1.0);
        let report = run_backtest(&registry, &req, &series(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(report.ignored_params, vec!["bogus".to_string()]);
        assert_eq!(report.params.get("fast_period"), Some(ParamValue::Int(3)));
    }

    #[test]
    fn unknown_strategy() {
        let registry = StrategyRegistry::with_builtins();
        let err = run_backtest(&registry, &BacktestRequest::new("nope"), &series(&[1.0])).unwrap_err();
        assert!(matches!(err, RunError::Strategy(StrategyError::UnknownStrategy(_))));
    }

    #[test]
    fn introspection_sorted_with_ranges() {
        let registry = StrategyRegistry::with_builtins();
        let info = introspect_params(&registry, "sma_cross").unwrap();
        let names: Vec<&str> = info.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["fast_period", "risk_pct", "slow_period"]);
        let fast = &info.params[0];
        assert_eq!(fast.kind, ParamKind::Int);
        assert_eq!((fast.suggested_min, fast.suggested_max), (5.0, 20.0));
        let json = serde_json::to_value(fast).unwrap();
        assert_eq!(json["type"], "int");
        assert_eq!(json["default"], 10);
    }

    #[test]
    fn optimization_rejects_unknown_objective_before_running() {
        let registry = StrategyRegistry::with_builtins();
        let req = OptimizationRequest::new("sma_cross").with_objective("sortino");
        let err = run_optimization(&registry, &req, &series(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(err, RunError::Optimize(OptimizeError::UnknownObjective(_))));
    }

    #[test]
    fn report_serializes_flat() {
        let registry = StrategyRegistry::with_builtins();
        let report = run_backtest(&registry, &BacktestRequest::new("null"), &series(&[5.0, 6.0])).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["summary"]["performance"]["pnl"], 0.0);
        assert_eq!(json["trace"]["equity"].as_array().unwrap().len(), 2);
    }
}
