//! Volume Weighted Average Price (VWAP).
//!
//! Intraday cumulative: VWAP[t] = cum(typical * volume)[t] / cum(volume)[t]
//! with typical price (high + low + close) / 3. Undefined while the
//! cumulative volume is zero.

use crate::data::Candle;

/// Compute the cumulative intraday VWAP over a bar series.
pub fn vwap(bars: &[Candle]) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(bars.len());
    let mut cum_tp_volume = 0.0;
    let mut cum_volume = 0.0;

    for bar in bars {
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        cum_tp_volume += typical * bar.volume;
        cum_volume += bar.volume;

        if cum_volume > 0.0 {
            result.push(Some(cum_tp_volume / cum_volume));
        } else {
            result.push(None);
        }
    }

    result
}

/// Percentage distance of `price` from the VWAP (positive when above).
///
/// Zero when the VWAP is undefined.
pub fn distance_from_vwap(price: f64, vwap: Option<f64>) -> f64 {
    match vwap {
        Some(v) if v != 0.0 => ((price - v) / v) * 100.0,
        _ => 0.0,
    }
}

// ============================================================================
// Tests
// ============================================================================
