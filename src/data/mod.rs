//! Market data module.
//!
//! Provides the candle types, the `MarketData` collaborator trait, a
//! CSV-backed store implementation, and OHLCV integrity validation.
//!
//! Expected CSV layouts:
//! - minute bars: `timestamp,open,high,low,close,volume` (one file per symbol)
//! - daily bars: `date,open,high,low,close,volume`
//! - news/events: `date,symbol,event_type,description`

mod csv_store;
mod provider;
mod validator;

pub use csv_store::{CsvNews, CsvStore, NoNews};
pub use provider::{DataError, MarketData, NewsSource};
pub use validator::{DataValidator, ValidationReport};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// A single candlestick (OHLCV).
///
/// Timestamps are exchange-local and naive; the core never converts
/// timezones. Candles are immutable once read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time (exchange-local)
    pub timestamp: NaiveDateTime,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

impl Candle {
    /// Check if this is a bullish candle
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check if this is a bearish candle
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Get the candle body size
    pub fn body_size(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Get the upper wick size
    pub fn upper_wick(&self) -> f64 {
        self.high - self.close.max(self.open)
    }

    /// Get the lower wick size
    pub fn lower_wick(&self) -> f64 {
        self.close.min(self.open) - self.low
    }

    /// Get the full range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Extract the close series from a slice of candles.
pub fn closes(bars: &[Candle]) -> Vec<f64> {
    bars.iter().map(|c| c.close).collect()
}

// ============================================================================
// News Events
// ============================================================================

/// A corporate news/event item attached to a symbol on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsEvent {
    /// Event type (e.g., "earnings", "results", "dividend")
    pub event_type: String,
    /// Free-text description
    pub description: String,
}

impl NewsEvent {
    /// Whether this event is a scheduled earnings/results release.
    ///
    /// These carry the highest news weight in pre-market scoring.
    pub fn is_earnings(&self) -> bool {
        matches!(self.event_type.as_str(), "earnings" | "results")
    }
}

// ============================================================================
// Tests
// ============================================================================
