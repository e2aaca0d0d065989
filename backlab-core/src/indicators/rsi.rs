//! Relative Strength Index (RSI).
//!
//! Exponential smoothing with alpha = 1/period of positive and negative
//! deltas, seeded at the first bar (whose delta counts as zero gain and zero loss).
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! When avg_loss is zero the ratio is undefined and the value is NaN.

use crate::domain::{Bar, PriceField};
use crate::indicators::indicator::Indicator;

pub const DEFAULT_RSI_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    source: PriceField,
    name: String,
}

impl Rsi {
    pub fn new(period: usize, source: PriceField) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            source,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n == 0 {
            return result;
        }

        let alpha = 1.0 / self.period as f64;
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        let mut prev = bars[0].field(self.source);

        for (i, bar) in bars.iter().enumerate().skip(1) {
            let curr = bar.field(self.source);
            let delta = curr - prev;
            prev = curr;
            if delta.is_nan() {
                continue;
            }
            let gain = delta.max(0.0);
            let loss = (-delta).max(0.0);
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
            result[i] = rsi_value(avg_gain, avg_loss);
        }
        result
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return f64::NAN;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
