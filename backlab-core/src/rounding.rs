//! Fixed decimal precision for reported numbers.
//!
//! Money is reported to 2 decimals, percentages to 4 and ratios to 6.

pub const MONEY_DECIMALS: i32 = 2;
pub const PCT_DECIMALS: i32 = 4;
pub const RATIO_DECIMALS: i32 = 6;
pub const PRICE_DECIMALS: i32 = 4;

/// Round half away from zero to `decimals` places. Non-finite input becomes 0.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // Avoid reporting -0.0.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn money(value: f64) -> f64 {
    round_to(value, MONEY_DECIMALS)
}

pub fn pct(value: f64) -> f64 {
    round_to(value, PCT_DECIMALS)
}

pub fn ratio(value: f64) -> f64 {
    round_to(value, RATIO_DECIMALS)
}
