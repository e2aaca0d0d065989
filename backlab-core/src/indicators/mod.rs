//! Indicator library.
//!
//! Four kinds implement the `Indicator` trait (SMA, EMA, WMA, RSI). Strategies
//! consume them densely through `IndicatorValues`; charts get the sparse
//! timestamped form from `compute`/`compute_all`.

pub mod ema;
pub mod indicator;
pub mod rsi;
pub mod sma;
pub mod spec;
pub mod wma;

pub use ema::Ema;
pub use indicator::{Indicator, IndicatorValues};
pub use rsi::Rsi;
pub use sma::Sma;
pub use spec::{
    compute, compute_all, compute_dense, IndicatorBundle, IndicatorError, IndicatorKind,
    IndicatorPoint, IndicatorSeries, IndicatorSpec,
};
pub use wma::Wma;

/// Create synthetic daily bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 1.0, low = max(min(open,close) - 1.0, 0.01), volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: (open.min(close) - 1.0).max(0.01),
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
