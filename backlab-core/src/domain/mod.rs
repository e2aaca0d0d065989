//! Domain types for BackLab

pub mod account;
pub mod bar;
pub mod fill;

pub use account::{Account, Position};
pub use bar::{Bar, BarSeries, PriceField, SeriesError};
pub use fill::{Fill, Side};
