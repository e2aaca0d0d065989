//! Exponential Moving Average (EMA).
//!
//! Smoothing factor alpha = 2 / (period + 1), seeded from the first value,
//! so there is no warm-up gap: EMA[0] = x[0], EMA[t] = alpha*x[t] + (1-alpha)*EMA[t-1].

use crate::domain::{Bar, PriceField};
use crate::indicators::indicator::Indicator;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    source: PriceField,
    name: String,
}

impl Ema {
    pub fn new(period: usize, source: PriceField) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            source,
            name: format!("ema_{period}"),
        }
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let alpha = self.alpha();
        let mut result = Vec::with_capacity(bars.len());
        let mut prev: Option<f64> = None;

        for bar in bars {
            let x = bar.field(self.source);
            if x.is_nan() {
                result.push(f64::NAN);
                continue;
            }
            let next = match prev {
                None => x,
                Some(p) => alpha * x + (1.0 - alpha) * p,
            };
            result.push(next);
            prev = Some(next);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn ema_seeded_from_first_value() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let result = Ema::new(3, PriceField::Close).compute(&bars);
        // alpha = 0.5
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 10.5, DEFAULT_EPSILON);
        assert_approx(result[2], 11.25, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_constant_series() {
        let bars = make_bars(&[5.0; 8]);
        let result = Ema::new(4, PriceField::Close).compute(&bars);
        for v in result {
            assert_approx(v, 5.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn ema_period_one_tracks_input() {
        let bars = make_bars(&[3.0, 7.0, 1.0]);
        let result = Ema::new(1, PriceField::Close).compute(&bars);
        assert_eq!(result, vec![3.0, 7.0, 1.0]);
    }

    #[test]
    fn ema_no_lookback() {
        assert_eq!(Ema::new(20, PriceField::Close).lookback(), 0);
    }
}
