use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{Account, Fill, Side};

/// Account value at one bar's close, before that bar's decision is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Full output of one simulation run. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// One point per bar, in bar order.
    pub equity: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub final_account: Account,
}

impl Trace {
    pub fn bar_count(&self) -> usize {
        self.equity.len()
    }

    /// Last recorded equity value, or starting cash for an empty trace.
    pub fn final_value(&self) -> f64 {
        self.equity
            .last()
            .map(|p| p.value)
            .unwrap_or(self.final_account.starting_cash)
    }

    pub fn equity_values(&self) -> Vec<f64> {
        self.equity.iter().map(|p| p.value).collect()
    }

    pub fn buys(&self) -> impl Iterator<Item = &Fill> {
        self.fills.iter().filter(|f| f.side == Side::Buy)
    }

    pub fn sells(&self) -> impl Iterator<Item = &Fill> {
        self.fills.iter().filter(|f| f.side == Side::Sell)
    }

    /// Completed buy -> sell pairs in order.
    pub fn round_trips(&self) -> Vec<(&Fill, &Fill)> {
        let mut trips = Vec::new();
        let mut open: Option<&Fill> = None;
        for fill in &self.fills {
            match (fill.side, open) {
                (Side::Buy, _) => open = Some(fill),
                (Side::Sell, Some(entry)) => {
                    trips.push((entry, fill));
                    open = None;
                }
                (Side::Sell, None) => {}
            }
        }
        trips
    }

    /// True when the run ended holding a position.
    pub fn ends_in_position(&self) -> bool {
        !self.final_account.is_flat()
    }
}
