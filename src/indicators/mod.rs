//! Technical indicator library.
//!
//! Pure, stateless functions over ordered OHLCV series. Every series
//! function returns a `Vec<Option<f64>>` aligned 1:1 with its input;
//! `None` marks an undefined value (insufficient history, zero cumulative
//! volume, no previous close). Callers must treat `None` as "insufficient
//! data", never as zero.

mod atr;
mod ema;
mod rsi;
mod vwap;

pub use atr::{atr, stop_loss, true_range, volatility_level, VolatilityLevel};
pub use ema::{ema, trend_of, Trend};
pub use rsi::rsi;
pub use vwap::{distance_from_vwap, vwap};

/// Round a price level to 2 decimals (exchange tick display convention).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Latest value of an indicator series, flattened.
pub fn latest(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}
