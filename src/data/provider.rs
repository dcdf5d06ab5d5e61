//! Market data collaborator traits.
//!
//! The screener core only talks to these traits; the CSV store is the
//! default implementation. A missing file or unknown symbol is not an
//! error — implementations return empty series / `None` so that a single
//! symbol can never abort a screening batch.

use std::fmt;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use super::{Candle, NewsEvent};

// ============================================================================
// Data Error
// ============================================================================

/// Errors raised by market data implementations.
///
/// Only genuinely broken inputs surface as errors; absent data is modeled
/// as an empty result instead.
#[derive(Debug, Clone)]
pub enum DataError {
    /// Filesystem-level failure (permissions, unreadable file)
    Io(String),
    /// A file exists but a row could not be parsed
    Malformed { file: String, message: String },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Malformed { file, message } => {
                write!(f, "Malformed data in {}: {}", file, message)
            }
        }
    }
}

impl std::error::Error for DataError {}

// ============================================================================
// Market Data Trait
// ============================================================================

/// Trait for candle data access.
///
/// All methods are per-symbol and independent; callers fan out across the
/// universe with bounded concurrency and isolate failures per symbol.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Load minute bars for one symbol on one trading day, restricted to
    /// the `[from, to]` window (inclusive, exchange-local times).
    ///
    /// Returns an empty vector when the symbol has no data.
    async fn minute_bars(
        &self,
        symbol: &str,
        date: NaiveDate,
        from: NaiveTime,
        to: NaiveTime,
    ) -> Result<Vec<Candle>, DataError>;

    /// Load up to `lookback_days` most recent daily bars for a symbol.
    ///
    /// Returns an empty vector when the symbol has no data.
    async fn daily_bars(&self, symbol: &str, lookback_days: usize) -> Result<Vec<Candle>, DataError>;

    /// Previous trading day's close strictly before `date`.
    async fn previous_close(&self, symbol: &str, date: NaiveDate) -> Result<Option<f64>, DataError>;
}

// ============================================================================
// News Source Trait
// ============================================================================

/// Trait for the news/corporate-calendar collaborator.
///
/// News never filters candidates, it only annotates them, so the interface
/// is a plain lookup.
pub trait NewsSource: Send + Sync {
    /// Look up the event attached to `symbol` on `date`, if any.
    fn news_for(&self, symbol: &str, date: NaiveDate) -> Option<NewsEvent>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_display() {
        let err = DataError::Io("permission denied".into());
        assert!(err.to_string().contains("permission denied"));

        let err = DataError::Malformed {
            file: "RELIANCE.NS_minute.csv".into(),
            message: "bad volume on line 3".into(),
        };
        let text = err.to_string();
        assert!(text.contains("RELIANCE.NS_minute.csv"));
        assert!(text.contains("line 3"));
    }
}
