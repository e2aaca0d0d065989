use serde::{Deserialize, Serialize};

/// Simulated account: cash plus a single long position.
///
/// Only the engine's fill step mutates an `Account`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub starting_cash: f64,
    pub cash: f64,
    pub position: Position,
    pub commission_rate: f64,
}

impl Account {
    pub fn new(starting_cash: f64, commission_rate: f64) -> Self {
        Self {
            starting_cash,
            cash: starting_cash,
            position: Position::flat(),
            commission_rate,
        }
    }

    /// Cash plus the position marked at `price`.
    pub fn value_at(&self, price: f64) -> f64 {
        self.cash + self.position.market_value(price)
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_flat()
    }
}

/// Long-only unit position. Cost basis is implied by the buy fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: u64,
    pub entry_price: f64,
}

impl Position {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }
}
