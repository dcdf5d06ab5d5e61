//! Average True Range (ATR).
//!
//! True range: max(high - low, |high - prev_close|, |low - prev_close|).
//! Undefined for the first bar (no previous close). ATR is the EMA of the
//! true-range series with alpha = 2 / (period + 1).

use serde::{Deserialize, Serialize};

use super::{ema, round2};
use crate::data::Candle;

/// True range of a bar given the previous close.
pub fn true_range(bar: &Candle, prev_close: f64) -> f64 {
    let hl = bar.high - bar.low;
    let hc = (bar.high - prev_close).abs();
    let lc = (bar.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Compute the ATR over a bar series.
///
/// Index 0 is always `None`; the remaining entries are the EMA of the
/// true-range series, all `None` when fewer than `period` true-range
/// values exist.
pub fn atr(bars: &[Candle], period: usize) -> Vec<Option<f64>> {
    let n = bars.len();
    if n == 0 {
        return Vec::new();
    }

    let tr: Vec<f64> = bars
        .windows(2)
        .map(|w| true_range(&w[1], w[0].close))
        .collect();

    let mut result = vec![None];
    result.extend(ema(&tr, period));
    result
}

/// ATR-based stop-loss level.
///
/// Long stops sit below entry, short stops above. When the ATR is
/// undefined the entry itself is returned so the caller's sizing stage can
/// reject the zero-risk setup.
pub fn stop_loss(entry: f64, atr: Option<f64>, multiplier: f64, long: bool) -> f64 {
    let Some(atr) = atr else {
        return entry;
    };

    let stop = if long {
        entry - atr * multiplier
    } else {
        entry + atr * multiplier
    };
    round2(stop)
}

// ============================================================================
// Volatility Tiering
// ============================================================================

/// Volatility bucket derived from ATR as a percentage of price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    /// ATR below 1% of price
    Low,
    /// ATR between 1% and 2% of price
    Medium,
    /// ATR above 2% of price
    High,
    /// ATR undefined or price zero
    Unknown,
}

/// Bucket the ATR relative to the current price.
pub fn volatility_level(atr: Option<f64>, price: f64) -> VolatilityLevel {
    let Some(atr) = atr else {
        return VolatilityLevel::Unknown;
    };
    if price == 0.0 {
        return VolatilityLevel::Unknown;
    }

    let atr_pct = (atr / price) * 100.0;
    if atr_pct < 1.0 {
        VolatilityLevel::Low
    } else if atr_pct < 2.0 {
        VolatilityLevel::Medium
    } else {
        VolatilityLevel::High
    }
}

// ============================================================================
// Tests
// ============================================================================
