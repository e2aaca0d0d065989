//! Parameter search.
//!
//! Builds a search space from a strategy's declared parameters and caller
//! ranges, drives the TPE sampler across repeated simulations on a shared,
//! tail-truncated series, isolates failed trials, then replays the best
//! parameters on the full series.

pub mod sampler;
pub mod space;
pub mod study;

pub use sampler::{Observation, TpeConfig, TpeSampler};
pub use space::{default_range, Bound, RangeRequest, RangeSource, SearchParam, SearchSpace};
pub use study::{Study, Trial, TrialOutcome, TrialState};

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use backlab_core::domain::BarSeries;
use backlab_core::engine::{self, EngineConfig, SimulationError, Trace};
use backlab_core::strategy::{ParamSet, StrategyTemplate};

use crate::fitness::{Direction, Objective};
use crate::metrics::{summarize, Summary};

pub const DEFAULT_TRIALS: usize = 20;
pub const DEFAULT_MAX_BARS: usize = 5000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("invalid search space for '{param}': {reason}")]
    InvalidSearchSpace { param: String, reason: String },

    #[error("unknown objective '{0}' (expected pnl, final_value, win_rate, sharpe_ratio or max_drawdown_pct)")]
    UnknownObjective(String),

    #[error("trial count must be at least 1, got {0}")]
    InvalidTrialCount(usize),

    #[error("no viable trial: all {failed} of {trials} trials failed")]
    NoViableTrial { trials: usize, failed: usize },

    #[error("simulation setup failed: {0}")]
    Simulation(#[from] SimulationError),
}

/// Search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeConfig {
    pub objective: Objective,
    pub trials: usize,
    pub seed: Option<u64>,
    /// Trials simulate at most this many trailing bars.
    pub max_bars: usize,
    /// Evaluate the uniform start-up batch on the rayon pool.
    pub parallel: bool,
    pub tpe: TpeConfig,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            objective: Objective::default(),
            trials: DEFAULT_TRIALS,
            seed: None,
            max_bars: DEFAULT_MAX_BARS,
            parallel: true,
            tpe: TpeConfig::default(),
        }
    }
}

impl OptimizeConfig {
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
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

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Everything a search produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub objective: Objective,
    pub direction: Direction,
    pub seed: Option<u64>,
    pub best_params: ParamSet,
    pub best_value: f64,
    pub best_trial: usize,
    /// Summary of the full-series replay, or of the best trial when the replay failed.
    pub best_metrics: Summary,
    pub best_trace: Option<Trace>,
    pub best_backtest_replayed: bool,
    pub trial_count: usize,
    pub failed_trial_count: usize,
    pub search_space: SearchSpace,
    /// Bars each trial simulated.
    pub bars_used: usize,
    pub trials: Vec<Trial>,
}

/// Run one trial: simulate and score.
pub fn evaluate(
    series: &BarSeries,
    template: &dyn StrategyTemplate,
    params: &ParamSet,
    engine_config: &EngineConfig,
    objective: Objective,
) -> TrialOutcome {
    let trace = engine::run(series, template, params, engine_config).map_err(|e| e.to_string())?;
    let summary = summarize(&trace, engine_config.starting_cash);
    Ok((objective.extract(&summary), summary))
}

/// Search `template`'s parameter space on `series`.
pub fn search(
    series: &BarSeries,
    template: &dyn StrategyTemplate,
    user_ranges: &BTreeMap<String, RangeRequest>,
    config: &OptimizeConfig,
    engine_config: &EngineConfig,
) -> Result<OptimizationResult, OptimizeError> {
    if config.trials == 0 {
        return Err(OptimizeError::InvalidTrialCount(0));
    }
    engine_config.validate()?;
    let space = SearchSpace::build(&template.params(), user_ranges)?;

    let budget = config.max_bars.max(1);
    let trial_series = if series.len() > budget {
        series.tail(budget)
    } else {
        series.clone()
    };
    let objective = config.objective;
    let mut sampler = TpeSampler::new(config.tpe, config.seed);
    let mut study = Study::new(objective);

    info!(
        strategy = template.key(),
        objective = %objective,
        trials = config.trials,
        params = space.len(),
        bars = trial_series.len(),
        "starting search"
    );

    // Start-up batch: suggested serially, evaluated in any order, told in order.
    let n_startup = config.tpe.n_startup.min(config.trials);
    let startup: Vec<ParamSet> = (0..n_startup).map(|_| sampler.sample_uniform(&space)).collect();
    let run_one = |params: &ParamSet| evaluate(&trial_series, template, params, engine_config, objective);
    let outcomes: Vec<TrialOutcome> = if config.parallel {
        startup.par_iter().map(&run_one).collect()
    } else {
        startup.iter().map(&run_one).collect()
    };
    for (params, outcome) in startup.into_iter().zip(outcomes) {
        log_trial(study.tell(params, outcome));
    }

    for _ in n_startup..config.trials {
        let history = study.observations(&space);
        let params = sampler.suggest(&space, &history);
        let outcome = run_one(&params);
        log_trial(study.tell(params, outcome));
    }

    let failed = study.failed_count();
    let best = study
        .best_trial()
        .cloned()
        .ok_or(OptimizeError::NoViableTrial {
            trials: config.trials,
            failed,
        })?;
    let best_value = best.value.unwrap_or_default();

    let (best_metrics, best_trace, replayed) =
        match engine::run(series, template, &best.params, engine_config) {
            Ok(trace) => (summarize(&trace, engine_config.starting_cash), Some(trace), true),
            Err(e) => {
                warn!(trial = best.number, error = %e, "best trial replay failed");
                (best.summary.clone().unwrap_or_else(|| empty_summary(engine_config)), None, false)
            }
        };

    info!(
        best_trial = best.number,
        best_value,
        failed,
        replayed,
        "search complete"
    );

    Ok(OptimizationResult {
        objective,
        direction: objective.direction(),
        seed: config.seed,
        best_params: best.params,
        best_value,
        best_trial: best.number,
        best_metrics,
        best_trace,
        best_backtest_replayed: replayed,
        trial_count: config.trials,
        failed_trial_count: failed,
        search_space: space,
        bars_used: trial_series.len(),
        trials: study.trials().to_vec(),
    })
}

fn log_trial(trial: &Trial) {
    match (&trial.value, &trial.error) {
        (Some(value), _) => debug!(trial = trial.number, value, "trial complete"),
        (None, Some(error)) => warn!(trial = trial.number, error = %error, "trial pruned"),
        (None, None) => {}
    }
}

fn empty_summary(engine_config: &EngineConfig) -> Summary {
    summarize(
        &Trace {
            equity: Vec::new(),
            fills: Vec::new(),
            final_account: backlab_core::domain::Account::new(
                engine_config.starting_cash,
                engine_config.commission_rate,
            ),
        },
        engine_config.starting_cash,
    )
}
