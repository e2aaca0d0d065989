//! Weighted Moving Average (WMA).
//!
//! Trailing window weighted linearly 1..=period, most recent value heaviest,
//! normalized by period*(period+1)/2. Lookback: period - 1.

use crate::domain::{Bar, PriceField};
use crate::indicators::indicator::Indicator;

#[derive(Debug, Clone)]
pub struct Wma {
    period: usize,
    source: PriceField,
    name: String,
}

impl Wma {
    pub fn new(period: usize, source: PriceField) -> Self {
        assert!(period >= 1, "WMA period must be >= 1");
        Self {
            period,
            source,
            name: format!("wma_{period}"),
        }
    }
}

impl Indicator for Wma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        let values: Vec<f64> = bars.iter().map(|b| b.field(self.source)).collect();
        let denom = (self.period * (self.period + 1)) as f64 / 2.0;
        for i in (self.period - 1)..n {
            let window = &values[i + 1 - self.period..=i];
            let weighted: f64 = window
                .iter()
                .enumerate()
                .map(|(k, v)| (k + 1) as f64 * v)
                .sum();
            result[i] = weighted / denom;
        }
        result
    }
}
