//! Backtest performance metrics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

// ============================================================================
// Day Record
// ============================================================================

/// Per-day funnel and trading counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayRecord {
    /// Trading date
    pub date: NaiveDate,
    /// Pre-market candidates produced
    pub pre_market_candidates: usize,
    /// Live-market candidates produced
    pub live_candidates: usize,
    /// Signals generated
    pub signals: usize,
    /// Trades admitted and resolved
    pub trades: usize,
    /// Realized P&L for the day
    pub pnl: f64,
}

impl DayRecord {
    /// An empty record for a day that produced nothing (or failed).
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            pre_market_candidates: 0,
            live_candidates: 0,
            signals: 0,
            trades: 0,
            pnl: 0.0,
        }
    }
}

// ============================================================================
// Backtest Metrics
// ============================================================================

/// Aggregate metrics over the day series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Trading days simulated
    pub total_days: usize,
    /// Days with at least one trade
    pub trading_days: usize,
    /// Signals generated across all days
    pub total_signals: usize,
    /// Trades taken across all days
    pub total_trades: usize,
    /// Peak-to-trough drawdown of the cumulative daily P&L (currency)
    pub max_drawdown: f64,
    /// Annualized Sharpe ratio of daily P&L (0 below 2 days)
    pub sharpe_ratio: f64,
}

impl BacktestMetrics {
    /// Compute metrics from the day series.
    pub fn from_days(days: &[DayRecord]) -> Self {
        let daily_pnl: Vec<f64> = days.iter().map(|d| d.pnl).collect();

        Self {
            total_days: days.len(),
            trading_days: days.iter().filter(|d| d.trades > 0).count(),
            total_signals: days.iter().map(|d| d.signals).sum(),
            total_trades: days.iter().map(|d| d.trades).sum(),
            max_drawdown: max_drawdown(&daily_pnl),
            sharpe_ratio: sharpe_ratio(&daily_pnl),
        }
    }
}

/// Peak-to-trough drawdown over the cumulative P&L series, in currency.
fn max_drawdown(daily_pnl: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut max_dd = 0.0_f64;

    for pnl in daily_pnl {
        cumulative += pnl;
        if cumulative > peak {
            peak = cumulative;
        }
        max_dd = max_dd.max(peak - cumulative);
    }

    max_dd
}

/// Simplified annualized Sharpe: mean/std of daily P&L scaled by sqrt(252).
///
/// Defined as 0 for fewer than 2 days or zero dispersion.
fn sharpe_ratio(daily_pnl: &[f64]) -> f64 {
    if daily_pnl.len() < 2 {
        return 0.0;
    }

    let mean = Statistics::mean(daily_pnl);
    let std_dev = Statistics::population_std_dev(daily_pnl);

    if std_dev > 0.0 {
        mean / std_dev * 252.0_f64.sqrt()
    } else {
        0.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date_offset: u32, trades: usize, pnl: f64) -> DayRecord {
        DayRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1 + date_offset).unwrap(),
            pre_market_candidates: 5,
            live_candidates: 2,
            signals: 1,
            trades,
            pnl,
        }
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        // cumulative: 100, 300, 150, 50, 250 → peak 300, trough 50 → dd 250
        let pnl = vec![100.0, 200.0, -150.0, -100.0, 200.0];
        assert!((max_drawdown(&pnl) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_drawdown_monotonic_gain_is_zero() {
        assert!((max_drawdown(&[10.0, 20.0, 30.0]) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_sharpe_short_series_is_zero() {
        assert!((sharpe_ratio(&[500.0]) - 0.0).abs() < 1e-9);
        assert!((sharpe_ratio(&[]) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_sharpe_zero_dispersion_is_zero() {
        assert!((sharpe_ratio(&[100.0, 100.0, 100.0]) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_sharpe_known_value() {
        // mean 50, population std 50 → 1.0 * sqrt(252)
        let sharpe = sharpe_ratio(&[0.0, 100.0]);
        assert!((sharpe - 252.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_aggregation() {
        let days = vec![day(0, 2, 500.0), day(1, 0, 0.0), day(2, 1, -200.0)];
        let metrics = BacktestMetrics::from_days(&days);

        assert_eq!(metrics.total_days, 3);
        assert_eq!(metrics.trading_days, 2);
        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.total_signals, 3);
        assert!((metrics.max_drawdown - 200.0).abs() < 1e-9);
    }
}
