//! Simple Moving Average (SMA).
//!
//! Arithmetic mean of the trailing `period` values of the source field.
//! Lookback: period - 1 (first valid value at index period-1).

use crate::domain::{Bar, PriceField};
use crate::indicators::indicator::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: PriceField,
    name: String,
}

impl Sma {
    pub fn new(period: usize, source: PriceField) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            source,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
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
        let mut sum: f64 = values[..self.period].iter().sum();
        result[self.period - 1] = sum / self.period as f64;

        for i in self.period..n {
            sum += values[i] - values[i - self.period];
            if sum.is_nan() {
                // Rebuild after a NaN leaves the window.
                sum = values[i + 1 - self.period..=i].iter().sum();
            }
            result[i] = sum / self.period as f64;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn sma_3_trailing_mean() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = Sma::new(3, PriceField::Close).compute(&bars);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 2.0, DEFAULT_EPSILON);
        assert_approx(result[3], 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_source() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = Sma::new(1, PriceField::Close).compute(&bars);
        assert_eq!(result, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn sma_reads_source_field() {
        let bars = make_bars(&[10.0, 20.0]);
        // make_bars: high = max(open, close) + 1
        let result = Sma::new(1, PriceField::High).compute(&bars);
        assert_approx(result[0], 11.0, DEFAULT_EPSILON);
        assert_approx(result[1], 21.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_bars() {
        let bars = make_bars(&[10.0, 11.0]);
        let result = Sma::new(5, PriceField::Close).compute(&bars);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20, PriceField::Close).lookback(), 19);
        assert_eq!(Sma::new(1, PriceField::Close).lookback(), 0);
    }
}
