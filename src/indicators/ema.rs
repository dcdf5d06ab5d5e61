//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * value[t] + (1 - alpha) * EMA[t-1] with
//! alpha = 2 / (period + 1), seeded directly from the first value (the
//! unadjusted form). A series shorter than `period` is entirely undefined.

use serde::{Deserialize, Serialize};

/// Compute the EMA over a value series.
///
/// Returns a series aligned 1:1 with the input. When `values.len() <
/// period` every entry is `None`; otherwise every entry is defined, the
/// early ones simply carrying less smoothing history.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    if period == 0 || n < period {
        return vec![None; n];
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(n);
    let mut prev = values[0];
    result.push(Some(prev));

    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        result.push(Some(prev));
    }

    result
}

// ============================================================================
// Trend Classification
// ============================================================================

/// Trend of a series relative to its fast/slow EMAs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// price > fast EMA > slow EMA
    Uptrend,
    /// price < fast EMA < slow EMA
    Downtrend,
    /// Anything else, including undefined EMAs
    Sideways,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uptrend => write!(f, "uptrend"),
            Self::Downtrend => write!(f, "downtrend"),
            Self::Sideways => write!(f, "sideways"),
        }
    }
}

/// Classify the trend from the current price and fast/slow EMA values.
pub fn trend_of(price: f64, ema_fast: Option<f64>, ema_slow: Option<f64>) -> Trend {
    let (Some(fast), Some(slow)) = (ema_fast, ema_slow) else {
        return Trend::Sideways;
    };

    if price > fast && fast > slow {
        Trend::Uptrend
    } else if price < fast && fast < slow {
        Trend::Downtrend
    } else {
        Trend::Sideways
    }
}

// ============================================================================
// Tests
// ============================================================================
