//! Backlab runner: analytics, optimization and the service call contracts.
//!
//! This crate builds on `backlab-core` to provide:
//! - Series loading from local files or an injected bar provider
//! - Trace analytics (performance, drawdown, trade statistics)
//! - Objectives and a TPE parameter search with failure isolation
//! - `run_backtest`, `introspect_params` and `run_optimization`
//! - TOML run configuration

pub mod config;
pub mod data_loader;
pub mod fitness;
pub mod metrics;
pub mod optimize;
pub mod runner;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{load_series, LoadError, LoadedSeries, SeriesSource};
pub use fitness::{Direction, Objective};
pub use metrics::{summarize, Summary, TradeRecord};
pub use optimize::{search, OptimizationResult, OptimizeConfig, OptimizeError, RangeRequest};
pub use runner::{
    introspect_params, run_backtest, run_from_config, run_optimization, BacktestReport,
    BacktestRequest, OptimizationReport, OptimizationRequest, ParamInfo, ParamIntrospection,
    RunError, SCHEMA_VERSION,
};
