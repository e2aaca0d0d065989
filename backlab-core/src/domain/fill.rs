use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Direction of an executed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Executed order, appended to the trace and never mutated afterwards.
///
/// Doubles as the chart marker for the bar it happened on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub side: Side,
    pub price: f64,
    pub quantity: u64,
    pub commission: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }

    /// Cash leaving (buy, negative) or entering (sell, positive) the account.
    pub fn cash_flow(&self) -> f64 {
        match self.side {
            Side::Buy => -(self.notional() + self.commission),
            Side::Sell => self.notional() - self.commission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fill(side: Side) -> Fill {
        Fill {
            bar_index: 0,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            side,
            price: 50.0,
            quantity: 10,
            commission: 0.5,
        }
    }

    #[test]
    fn buy_cash_flow_includes_commission() {
        assert!((fill(Side::Buy).cash_flow() + 500.5).abs() < 1e-10);
    }

    #[test]
    fn sell_cash_flow_net_of_commission() {
        assert!((fill(Side::Sell).cash_flow() - 499.5).abs() < 1e-10);
    }

    #[test]
    fn side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"sell\"");
    }
}
