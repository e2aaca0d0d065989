use serde::{Deserialize, Serialize};

use super::SimulationError;
use crate::rounding::money;

pub const DEFAULT_STARTING_CASH: f64 = 10_000.0;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.001;

/// Account settings for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub starting_cash: f64,
    /// Fraction of notional charged on every fill, both sides.
    pub commission_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_cash: DEFAULT_STARTING_CASH,
            commission_rate: DEFAULT_COMMISSION_RATE,
        }
    }
}

impl EngineConfig {
    pub fn new(starting_cash: f64, commission_rate: f64) -> Self {
        Self {
            starting_cash,
            commission_rate,
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.starting_cash.is_finite() || self.starting_cash <= 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "starting_cash must be positive, got {}",
                self.starting_cash
            )));
        }
        // Equity and pnl are reported in cents; a finer start would drift from them.
        if money(self.starting_cash) != self.starting_cash {
            return Err(SimulationError::InvalidConfig(format!(
                "starting_cash must be a whole number of cents, got {}",
                self.starting_cash
            )));
        }
        if !self.commission_rate.is_finite() || self.commission_rate < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "commission_rate must be non-negative, got {}",
                self.commission_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.starting_cash, 10_000.0);
        assert_eq!(config.commission_rate, 0.001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_cash() {
        assert!(EngineConfig::new(0.0, 0.001).validate().is_err());
        assert!(EngineConfig::new(f64::NAN, 0.001).validate().is_err());
    }

    #[test]
    fn rejects_sub_cent_cash() {
        let err = EngineConfig::new(1_234.567, 0.001).validate().unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(ref m) if m.contains("cents")));
        assert!(EngineConfig::new(1_234.56, 0.001).validate().is_ok());
        assert!(EngineConfig::new(0.1 + 0.2, 0.0).validate().is_err());
    }

    #[test]
    fn rejects_negative_commission() {
        assert!(EngineConfig::new(1_000.0, -0.01).validate().is_err());
    }
}
