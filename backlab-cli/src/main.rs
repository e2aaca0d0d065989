//! Backlab CLI: backtest, parameter introspection, optimization and data
//! normalization from the command line.
//!
//! Commands:
//! - `backtest` runs one strategy over a data file and prints the report as JSON
//! - `params` lists registered strategies or describes one strategy's parameters
//! - `optimize` searches a strategy's parameters with TPE
//! - `normalize` loads a data file and reports what normalization did

mod logging;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use backlab_core::data::{BucketWidth, SourceHint};
use backlab_core::engine::{EngineConfig, DEFAULT_COMMISSION_RATE, DEFAULT_STARTING_CASH};
use backlab_core::strategy::StrategyRegistry;
use backlab_runner::{
    introspect_params, load_series, run_backtest, run_optimization, BacktestConfig,
    BacktestRequest, LoadedSeries, OptimizationRequest, RangeRequest, SeriesSource,
};

use logging::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "backlab", about = "Backlab: bar-by-bar backtesting and parameter search")]
struct Cli {
    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// Only log warnings and errors.
    #[arg(long, short, default_value_t = false, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where bars come from: a TOML config with a `[data]` section, or a file.
#[derive(clap::Args, Debug, Clone)]
struct DataArgs {
    /// TOML run config. Flags given alongside override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV or Parquet file with OHLCV rows or trade ticks.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Treat the data file as trade ticks bucketed at this width (1m or 5m).
    #[arg(long)]
    ticks: Option<String>,

    /// Strategy key, e.g. sma_cross.
    #[arg(long)]
    strategy: Option<String>,

    /// Starting cash.
    #[arg(long)]
    cash: Option<f64>,

    /// Commission rate as a fraction of notional, e.g. 0.001.
    #[arg(long)]
    commission: Option<f64>,

    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest and print the report as JSON.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// Parameter override, NAME=VALUE. Repeatable.
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
    /// List strategies, or describe one strategy's parameters.
    Params {
        /// Strategy key. Lists every registered key when omitted.
        strategy: Option<String>,
    },
    /// Search a strategy's parameters and print the best set as JSON.
    Optimize {
        #[command(flatten)]
        data: DataArgs,

        /// Search range, NAME=MIN:MAX. Repeatable.
        #[arg(long = "range", value_name = "NAME=MIN:MAX")]
        ranges: Vec<String>,

        /// Objective: pnl, final_value, win_rate, sharpe_ratio, max_drawdown_pct.
        #[arg(long)]
        objective: Option<String>,

        /// Number of trials.
        #[arg(long)]
        trials: Option<usize>,

        /// Sampler seed for reproducible searches.
        #[arg(long)]
        seed: Option<u64>,

        /// Evaluate startup trials on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Load and normalize a data file, then print what was kept and dropped.
    Normalize {
        /// CSV or Parquet file.
        data: PathBuf,

        /// Bucket trade ticks at this width (1m or 5m).
        #[arg(long)]
        ticks: Option<String>,

        /// Column holding the timestamp when no standard name is present.
        #[arg(long)]
        index_column: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.quiet { Level::WARN } else { Level::INFO };
    init_logging(cli.log_format, level);

    let registry = StrategyRegistry::with_builtins();
    match cli.command {
        Commands::Backtest { data, params } => run_backtest_cmd(&registry, data, params),
        Commands::Params { strategy } => run_params_cmd(&registry, strategy.as_deref()),
        Commands::Optimize {
            data,
            ranges,
            objective,
            trials,
            seed,
            sequential,
        } => run_optimize_cmd(&registry, data, ranges, objective, trials, seed, sequential),
        Commands::Normalize {
            data,
            ticks,
            index_column,
        } => run_normalize_cmd(&data, ticks.as_deref(), index_column),
    }
}

/// Config file (if any) merged with command-line overrides.
struct Resolved {
    config: Option<BacktestConfig>,
    strategy: String,
    engine: EngineConfig,
    source: SeriesSource,
}

fn resolve(data: &DataArgs) -> Result<Resolved> {
    let config = data
        .config
        .as_deref()
        .map(BacktestConfig::from_file)
        .transpose()?;

    let strategy = match (&data.strategy, &config) {
        (Some(key), _) => key.clone(),
        (None, Some(cfg)) => cfg.backtest.strategy.clone(),
        (None, None) => bail!("--strategy is required without --config"),
    };

    let (base_cash, base_rate) = match &config {
        Some(cfg) => (cfg.backtest.starting_cash, cfg.backtest.commission_rate),
        None => (DEFAULT_STARTING_CASH, DEFAULT_COMMISSION_RATE),
    };
    let engine = EngineConfig::new(
        data.cash.unwrap_or(base_cash),
        data.commission.unwrap_or(base_rate),
    );
    engine.validate()?;

    let source = match (&data.data, &config) {
        (Some(path), _) => SeriesSource::File {
            path: path.clone(),
            hint: hint_for(data.ticks.as_deref(), None)?,
        },
        (None, Some(cfg)) => cfg
            .series_source()?
            .context("config has no [data] section and --data was not given")?,
        (None, None) => bail!("one of --data or --config is required"),
    };

    Ok(Resolved {
        config,
        strategy,
        engine,
        source,
    })
}

fn hint_for(ticks: Option<&str>, index_column: Option<String>) -> Result<SourceHint> {
    Ok(match ticks {
        Some(raw) => SourceHint::Ticks {
            width: raw.parse::<BucketWidth>()?,
        },
        None => SourceHint::Ohlcv { index_column },
    })
}

fn load(source: &SeriesSource) -> Result<LoadedSeries> {
    load_series(source, None).with_context(|| format!("loading {}", source.describe()))
}

fn run_backtest_cmd(
    registry: &StrategyRegistry,
    data: DataArgs,
    raw_params: Vec<String>,
) -> Result<()> {
    let resolved = resolve(&data)?;
    let mut params = resolved
        .config
        .as_ref()
        .map(|cfg| cfg.params.clone())
        .unwrap_or_default();
    for raw in &raw_params {
        let (name, value) = parse_param(raw)?;
        params.insert(name, value);
    }

    let loaded = load(&resolved.source)?;
    let request = BacktestRequest {
        strategy: resolved.strategy,
        engine: resolved.engine,
        params,
    };
    let report = run_backtest(registry, &request, &loaded.series)?;

    if !report.ignored_params.is_empty() {
        eprintln!("Ignored parameters: {}", report.ignored_params.join(", "));
    }
    let perf = &report.summary.performance;
    eprintln!(
        "{}: final value {:.2}, pnl {:.2} ({:.2}%), {} closed trades",
        report.strategy, perf.final_value, perf.pnl, perf.pnl_pct, report.summary.trades.total_closed
    );
    emit(&report, data.output.as_deref())
}

fn run_params_cmd(registry: &StrategyRegistry, key: Option<&str>) -> Result<()> {
    match key {
        Some(key) => emit(&introspect_params(registry, key)?, None),
        None => {
            for key in registry.keys() {
                let template = registry.get(key)?;
                println!("{key:<14} {}", template.name());
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_optimize_cmd(
    registry: &StrategyRegistry,
    data: DataArgs,
    raw_ranges: Vec<String>,
    objective: Option<String>,
    trials: Option<usize>,
    seed: Option<u64>,
    sequential: bool,
) -> Result<()> {
    let resolved = resolve(&data)?;

    let mut request = OptimizationRequest::new(resolved.strategy);
    request.engine = resolved.engine;
    if let Some(cfg) = &resolved.config {
        let section = &cfg.optimize;
        request.objective = section.objective.clone();
        request.trials = section.trials;
        request.seed = section.seed;
        request.max_bars = section.max_bars;
        request.parallel = section.parallel;
        request.ranges = section.ranges.clone();
    }
    for raw in &raw_ranges {
        let (name, range) = parse_range(raw)?;
        request.ranges.insert(name, range);
    }
    if let Some(objective) = objective {
        request.objective = objective;
    }
    if let Some(trials) = trials {
        request.trials = trials;
    }
    if seed.is_some() {
        request.seed = seed;
    }
    if sequential {
        request.parallel = false;
    }

    let loaded = load(&resolved.source)?;
    info!(
        strategy = %request.strategy,
        objective = %request.objective,
        trials = request.trials,
        "starting optimization"
    );
    let report = run_optimization(registry, &request, &loaded.series)?;

    let best = &report.result;
    let params: Vec<String> = best
        .best_params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    eprintln!(
        "best {} = {:.4} at trial {} ({} of {} trials failed): {}",
        best.objective,
        best.best_value,
        best.best_trial,
        best.failed_trial_count,
        best.trial_count,
        params.join(" ")
    );
    emit(&report, data.output.as_deref())
}

#[derive(Serialize)]
struct NormalizeOutput<'a> {
    origin: &'a str,
    dataset_hash: &'a str,
    bars: usize,
    first: String,
    last: String,
    report: &'a backlab_core::data::NormalizeReport,
}

fn run_normalize_cmd(path: &Path, ticks: Option<&str>, index_column: Option<String>) -> Result<()> {
    let source = SeriesSource::File {
        path: path.to_path_buf(),
        hint: hint_for(ticks, index_column)?,
    };
    let loaded = load(&source)?;
    let output = NormalizeOutput {
        origin: &loaded.origin,
        dataset_hash: &loaded.dataset_hash,
        bars: loaded.series.len(),
        first: loaded.series.first().timestamp.to_string(),
        last: loaded.series.last().timestamp.to_string(),
        report: &loaded.report,
    };
    emit(&output, None)
}

/// Pretty JSON to `path`, or stdout.
fn emit<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Report saved to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, f64)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got '{raw}'");
    };
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("parameter '{name}' is not a number"))?;
    Ok((name.trim().to_string(), value))
}

fn parse_range(raw: &str) -> Result<(String, RangeRequest)> {
    let Some((name, bounds)) = raw.split_once('=') else {
        bail!("expected NAME=MIN:MAX, got '{raw}'");
    };
    let Some((min, max)) = bounds.split_once(':') else {
        bail!("expected MIN:MAX for '{name}', got '{bounds}'");
    };
    let min: f64 = min.trim().parse().with_context(|| format!("bad min for '{name}'"))?;
    let max: f64 = max.trim().parse().with_context(|| format!("bad max for '{name}'"))?;
    Ok((name.trim().to_string(), RangeRequest::new(min, max)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_pairs_parse() {
        assert_eq!(parse_param("fast_period=12").unwrap(), ("fast_period".into(), 12.0));
        assert_eq!(parse_param(" risk_pct = 2.5").unwrap(), ("risk_pct".into(), 2.5));
        assert!(parse_param("fast_period").is_err());
        assert!(parse_param("fast_period=abc").is_err());
    }

    #[test]
    fn range_pairs_parse() {
        let (name, range) = parse_range("slow_period=20:60").unwrap();
        assert_eq!(name, "slow_period");
        assert_eq!(range, RangeRequest::new(20.0, 60.0));
        assert!(parse_range("slow_period=20").is_err());
        assert!(parse_range("slow_period").is_err());
    }

    #[test]
    fn tick_hint_requires_supported_width() {
        assert!(matches!(
            hint_for(Some("5m"), None).unwrap(),
            SourceHint::Ticks { width: BucketWidth::FiveMinute }
        ));
        assert!(hint_for(Some("3m"), None).is_err());
        assert_eq!(hint_for(None, None).unwrap(), SourceHint::default());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn data_args_need_a_source() {
        let args = DataArgs {
            config: None,
            data: None,
            ticks: None,
            strategy: Some("null".into()),
            cash: None,
            commission: None,
            output: None,
        };
        let err = resolve(&args).err().unwrap();
        assert!(err.to_string().contains("--data"));
    }
}
