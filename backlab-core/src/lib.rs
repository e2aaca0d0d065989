//! Backlab core: market data, indicators, strategies and the simulation engine.
//!
//! This crate holds everything a single backtest needs:
//! - Data normalization (OHLCV frames and tick buckets into a canonical bar series)
//! - Indicator library (SMA, EMA, WMA, RSI) with declarative specs
//! - Strategy contract, parameter declarations and the built-in registry
//! - Single-position, bar-by-bar simulation engine producing an equity trace
//!
//! Analytics, optimization and the call contracts live in `backlab-runner`.

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod rounding;
pub mod strategy;
