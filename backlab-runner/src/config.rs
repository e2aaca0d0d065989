//! TOML run configuration.
//!
//! ```toml
//! [backtest]
//! strategy = "sma_cross"
//! starting_cash = 10000.0
//! commission_rate = 0.001
//!
//! [data]
//! path = "data/spy.csv"
//! mode = "ohlcv"          # or "ticks" with bucket = "1m" | "5m"
//!
//! [params]
//! fast_period = 12
//!
//! [optimize]
//! objective = "sharpe_ratio"
//! trials = 50
//! seed = 7
//!
//! [optimize.ranges.fast_period]
//! min = 5
//! max = 20
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use backlab_core::data::{BucketWidth, SourceHint};
use backlab_core::engine::{EngineConfig, DEFAULT_COMMISSION_RATE, DEFAULT_STARTING_CASH};

use crate::data_loader::SeriesSource;
use crate::fitness::Objective;
use crate::optimize::{OptimizeConfig, RangeRequest, TpeConfig, DEFAULT_MAX_BARS, DEFAULT_TRIALS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete file configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub data: Option<DataSection>,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    #[serde(default)]
    pub optimize: OptimizeSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub strategy: String,
    #[serde(default = "default_starting_cash")]
    pub starting_cash: f64,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    #[default]
    Ohlcv,
    Ticks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    pub path: PathBuf,
    #[serde(default)]
    pub mode: DataMode,
    /// Tick bucket width, required in ticks mode.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Fallback timestamp column for frames saved with their index.
    #[serde(default)]
    pub index_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeSection {
    #[serde(default = "default_objective")]
    pub objective: String,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_max_bars")]
    pub max_bars: usize,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_startup_trials")]
    pub startup_trials: usize,
    #[serde(default)]
    pub ranges: BTreeMap<String, RangeRequest>,
}

impl Default for OptimizeSection {
    fn default() -> Self {
        Self {
            objective: default_objective(),
            trials: default_trials(),
            seed: None,
            max_bars: default_max_bars(),
            parallel: default_parallel(),
            startup_trials: default_startup_trials(),
            ranges: BTreeMap::new(),
        }
    }
}

fn default_starting_cash() -> f64 {
    DEFAULT_STARTING_CASH
}

fn default_commission_rate() -> f64 {
    DEFAULT_COMMISSION_RATE
}

fn default_objective() -> String {
    Objective::default().to_string()
}

fn default_trials() -> usize {
    DEFAULT_TRIALS
}

fn default_max_bars() -> usize {
    DEFAULT_MAX_BARS
}

fn default_parallel() -> bool {
    true
}

fn default_startup_trials() -> usize {
    TpeConfig::default().n_startup
}

impl BacktestConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.engine_config()?;
        Ok(config)
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let config = EngineConfig::new(self.backtest.starting_cash, self.backtest.commission_rate);
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    /// Series source from the `[data]` section, if present.
    pub fn series_source(&self) -> Result<Option<SeriesSource>, ConfigError> {
        let Some(data) = &self.data else {
            return Ok(None);
        };
        let hint = match data.mode {
            DataMode::Ohlcv => SourceHint::Ohlcv {
                index_column: data.index_column.clone(),
            },
            DataMode::Ticks => {
                let raw = data.bucket.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("data.bucket is required in ticks mode".into())
                })?;
                let width: BucketWidth = raw
                    .parse()
                    .map_err(|e: backlab_core::data::DataError| ConfigError::Invalid(e.to_string()))?;
                SourceHint::Ticks { width }
            }
        };
        Ok(Some(SeriesSource::File {
            path: data.path.clone(),
            hint,
        }))
    }

    pub fn optimize_config(&self) -> Result<OptimizeConfig, ConfigError> {
        let section = &self.optimize;
        let objective: Objective = section
            .objective
            .parse()
            .map_err(|e: crate::optimize::OptimizeError| ConfigError::Invalid(e.to_string()))?;
        Ok(OptimizeConfig {
            objective,
            trials: section.trials,
            seed: section.seed,
            max_bars: section.max_bars,
            parallel: section.parallel,
            tpe: TpeConfig {
                n_startup: section.startup_trials,
                ..TpeConfig::default()
            },
        })
    }
}
