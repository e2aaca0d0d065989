//! Interfaces to external market-data and brokerage collaborators.
//!
//! No network client lives in this crate. Service code implements these
//! traits and hands raw frames to the normalizer.

use std::fmt;
use std::str::FromStr;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::data::DataError;

/// Bar intervals a provider may be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
        }
    }
}

impl FromStr for Interval {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "1h" => Ok(Self::OneHour),
            "1d" => Ok(Self::OneDay),
            other => Err(DataError::UnsupportedInterval(other.to_string())),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to fetch: a symbol, a bar interval and a lookback period such as "1y".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub symbol: String,
    pub interval: Interval,
    pub period: String,
}

/// Source of raw OHLCV frames ("fetch bars for symbol/interval/period").
///
/// Implementations own their own timeouts and retries. The returned frame is
/// normalized by the caller.
pub trait BarProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self, request: &FetchRequest) -> Result<DataFrame, DataError>;
}

/// Snapshot of a brokerage account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub currency: String,
    pub cash: f64,
    pub equity: f64,
    pub buying_power: f64,
}

/// Source of account information ("fetch account info").
pub trait AccountProvider: Send + Sync {
    fn account_info(&self) -> Result<AccountInfo, DataError>;
}
