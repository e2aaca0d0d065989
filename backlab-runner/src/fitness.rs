//! Optimization objectives: which summary figure to rank trials by.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::metrics::Summary;
use crate::optimize::OptimizeError;

/// Whether larger or smaller objective values are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Maximize,
    Minimize,
}

/// Scalar objective extracted from a [`Summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    Pnl,
    FinalValue,
    WinRate,
    #[serde(alias = "sharpe")]
    SharpeRatio,
    MaxDrawdownPct,
}

impl Objective {
    pub const ALL: [Objective; 5] = [
        Self::Pnl,
        Self::FinalValue,
        Self::WinRate,
        Self::SharpeRatio,
        Self::MaxDrawdownPct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pnl => "pnl",
            Self::FinalValue => "final_value",
            Self::WinRate => "win_rate",
            Self::SharpeRatio => "sharpe_ratio",
            Self::MaxDrawdownPct => "max_drawdown_pct",
        }
    }

    /// Extract the objective value from a summary.
    pub fn extract(&self, summary: &Summary) -> f64 {
        match self {
            Self::Pnl => summary.performance.pnl,
            Self::FinalValue => summary.performance.final_value,
            Self::WinRate => summary.trades.win_rate,
            Self::SharpeRatio => summary.performance.sharpe_ratio,
            Self::MaxDrawdownPct => summary.risk.max_drawdown_pct,
        }
    }

    /// Drawdown is minimized; everything else is maximized.
    pub fn direction(&self) -> Direction {
        match self {
            Self::MaxDrawdownPct => Direction::Minimize,
            _ => Direction::Maximize,
        }
    }

    pub fn is_higher_better(&self) -> bool {
        self.direction() == Direction::Maximize
    }

    /// Strictly better. Ties are not better, so the earlier result is kept.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self.direction() {
            Direction::Maximize => a > b,
            Direction::Minimize => a < b,
        }
    }

    /// Value mapped so that lower is always better.
    pub fn loss(&self, value: f64) -> f64 {
        match self.direction() {
            Direction::Maximize => -value,
            Direction::Minimize => value,
        }
    }
}

impl FromStr for Objective {
    type Err = OptimizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pnl" => Ok(Self::Pnl),
            "final_value" => Ok(Self::FinalValue),
            "win_rate" => Ok(Self::WinRate),
            "sharpe" | "sharpe_ratio" => Ok(Self::SharpeRatio),
            "max_drawdown_pct" => Ok(Self::MaxDrawdownPct),
            _ => Err(OptimizeError::UnknownObjective(s.to_string())),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
