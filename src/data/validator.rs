//! OHLCV data integrity validation.
//!
//! Checks the structural invariants of a candle series: high is the true
//! maximum, low the true minimum, volume non-negative, prices finite, and
//! the series has no unexpected time gaps.

use chrono::Duration;
use serde::Serialize;

use super::Candle;

// ============================================================================
// Validation Report
// ============================================================================

/// Result of validating one symbol's candle series.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Symbol validated
    pub symbol: String,
    /// Number of minute candles found
    pub minute_candles: usize,
    /// Number of daily candles found
    pub daily_candles: usize,
    /// Integrity violations found (empty means valid)
    pub errors: Vec<String>,
    /// Number of time gaps detected in the minute series
    pub time_gaps: usize,
}

impl ValidationReport {
    /// Whether the series passed all checks.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// Data Validator
// ============================================================================

/// Validator for OHLCV series integrity.
pub struct DataValidator;

impl DataValidator {
    /// Check the OHLC/volume invariants of a candle series.
    ///
    /// Returns one message per violation class with the offending bar count.
    pub fn validate_series(bars: &[Candle]) -> Vec<String> {
        let mut errors = Vec::new();

        let non_finite = bars
            .iter()
            .filter(|c| {
                !(c.open.is_finite() && c.high.is_finite() && c.low.is_finite() && c.close.is_finite())
            })
            .count();
        if non_finite > 0 {
            errors.push(format!("{} candles with non-finite prices", non_finite));
        }

        let high_low = bars.iter().filter(|c| c.high < c.low).count();
        if high_low > 0 {
            errors.push(format!("{} candles where high < low", high_low));
        }

        let high_body = bars
            .iter()
            .filter(|c| c.high < c.open || c.high < c.close)
            .count();
        if high_body > 0 {
            errors.push(format!("{} candles where high < open/close", high_body));
        }

        let low_body = bars
            .iter()
            .filter(|c| c.low > c.open || c.low > c.close)
            .count();
        if low_body > 0 {
            errors.push(format!("{} candles where low > open/close", low_body));
        }

        let negative_volume = bars.iter().filter(|c| c.volume < 0.0).count();
        if negative_volume > 0 {
            errors.push(format!("{} candles with negative volume", negative_volume));
        }

        errors
    }

    /// Count time gaps larger than 1.5x the expected bar interval.
    pub fn count_gaps(bars: &[Candle], expected: Duration) -> usize {
        if bars.len() < 2 {
            return 0;
        }

        let tolerance = expected + expected / 2;
        bars.windows(2)
            .filter(|w| w[1].timestamp - w[0].timestamp > tolerance)
            .count()
    }

    /// Build a full report for one symbol's minute and daily series.
    pub fn report(
        symbol: &str,
        minute_bars: &[Candle],
        daily_bars: &[Candle],
        minute_interval: Duration,
    ) -> ValidationReport {
        let mut errors = Self::validate_series(minute_bars);
        errors.extend(
            Self::validate_series(daily_bars)
                .into_iter()
                .map(|e| format!("daily: {}", e)),
        );

        ValidationReport {
            symbol: symbol.to_string(),
            minute_candles: minute_bars.len(),
            daily_candles: daily_bars.len(),
            errors,
            time_gaps: Self::count_gaps(minute_bars, minute_interval),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
