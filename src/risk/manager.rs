//! Trade ledger and session risk limits.
//!
//! Tracks open/closed trades, capital, and the counters backing the
//! circuit breakers: trades-per-day, consecutive losses, and the capital
//! floor. `reset_daily_counters` zeroes the daily trade count only —
//! consecutive losses deliberately carry across day boundaries.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::RiskConfig;
use crate::signal::{Side, Signal};

use super::sizing::Position;

// ============================================================================
// Trade
// ============================================================================

/// Trade lifecycle state. One-way: open → closed, never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// A tracked trade in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Monotonic trade id (1-based)
    pub id: u64,
    /// Symbol
    pub symbol: String,
    /// Direction
    pub side: Side,
    /// Entry price
    pub entry: f64,
    /// Stop-loss price
    pub stop_loss: f64,
    /// Target price
    pub target: f64,
    /// Shares traded
    pub quantity: u64,
    /// Entry timestamp
    pub entry_time: NaiveDateTime,
    /// Lifecycle state
    pub status: TradeStatus,
    /// Exit price, set on close
    pub exit_price: Option<f64>,
    /// Exit timestamp, set on close
    pub exit_time: Option<NaiveDateTime>,
    /// Realized P&L
    pub pnl: f64,
    /// Realized P&L as % of position value
    pub pnl_pct: f64,
}

impl Trade {
    /// Whether the trade is still open.
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }
}

// ============================================================================
// Errors & Limits
// ============================================================================

/// Why trade admission is currently blocked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeBlock {
    #[error("max trades per day reached ({0})")]
    DailyLimit(u32),
    #[error("max consecutive losses reached ({0})")]
    ConsecutiveLosses(u32),
    #[error("capital below {0:.0}% of initial")]
    CapitalFloor(f64),
}

/// Ledger lookup failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("trade {0} not found")]
    NotFound(u64),
    #[error("trade {0} already closed")]
    AlreadyClosed(u64),
}

// ============================================================================
// Trade Summary
// ============================================================================

/// Session statistics, computed from closed trades only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSummary {
    pub total_trades: usize,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub average_pnl: f64,
    pub current_capital: f64,
    pub capital_change: f64,
    pub capital_change_pct: f64,
    pub consecutive_losses: u32,
    pub daily_trades: u32,
}

// ============================================================================
// Risk Manager
// ============================================================================

/// Session risk manager: the single owner of the trade ledger.
pub struct RiskManager {
    initial_capital: f64,
    capital: f64,
    config: RiskConfig,
    trades: Vec<Trade>,
    daily_trades: u32,
    consecutive_losses: u32,
    winning_trades: u32,
    losing_trades: u32,
}

impl RiskManager {
    pub fn new(initial_capital: f64, config: RiskConfig) -> Self {
        Self {
            initial_capital,
            capital: initial_capital,
            config,
            trades: Vec::new(),
            daily_trades: 0,
            consecutive_losses: 0,
            winning_trades: 0,
            losing_trades: 0,
        }
    }

    /// Current capital.
    pub fn capital(&self) -> f64 {
        self.capital
    }

    /// Trades admitted today.
    pub fn daily_trades(&self) -> u32 {
        self.daily_trades
    }

    /// Current consecutive-loss streak.
    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Check whether another trade may be admitted.
    ///
    /// A block is a session state, not an error: admission stays halted
    /// until the corresponding counter changes.
    pub fn can_take_trade(&self) -> Result<(), TradeBlock> {
        if self.daily_trades >= self.config.max_trades_per_day {
            return Err(TradeBlock::DailyLimit(self.config.max_trades_per_day));
        }
        if self.consecutive_losses >= self.config.max_consecutive_losses {
            return Err(TradeBlock::ConsecutiveLosses(
                self.config.max_consecutive_losses,
            ));
        }
        let floor = self.initial_capital * (self.config.capital_floor_pct / 100.0);
        if self.capital < floor {
            return Err(TradeBlock::CapitalFloor(self.config.capital_floor_pct));
        }
        Ok(())
    }

    /// Open a new trade from a sized signal. Ids are monotonic, 1-based.
    pub fn add_trade(
        &mut self,
        signal: &Signal,
        position: &Position,
        entry_time: NaiveDateTime,
    ) -> u64 {
        let id = self.trades.len() as u64 + 1;
        let trade = Trade {
            id,
            symbol: signal.symbol.clone(),
            side: signal.side,
            entry: signal.entry,
            stop_loss: signal.stop_loss,
            target: signal.target,
            quantity: position.quantity,
            entry_time,
            status: TradeStatus::Open,
            exit_price: None,
            exit_time: None,
            pnl: 0.0,
            pnl_pct: 0.0,
        };

        info!(
            trade_id = id,
            symbol = %trade.symbol,
            side = %trade.side,
            quantity = trade.quantity,
            entry = trade.entry,
            "Trade opened"
        );

        self.trades.push(trade);
        self.daily_trades += 1;
        id
    }

    /// Close an open trade at `exit_price`, updating capital and the
    /// win/loss counters. A flat exit (pnl == 0) counts as a loss.
    pub fn close_trade(
        &mut self,
        id: u64,
        exit_price: f64,
        exit_time: NaiveDateTime,
    ) -> Result<Trade, LedgerError> {
        let trade = self
            .trades
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(LedgerError::NotFound(id))?;

        if trade.status != TradeStatus::Open {
            return Err(LedgerError::AlreadyClosed(id));
        }

        let quantity = trade.quantity as f64;
        let pnl = match trade.side {
            Side::Buy => (exit_price - trade.entry) * quantity,
            Side::Sell => (trade.entry - exit_price) * quantity,
        };
        let pnl_pct = if trade.entry != 0.0 && quantity > 0.0 {
            (pnl / (trade.entry * quantity)) * 100.0
        } else {
            0.0
        };

        trade.status = TradeStatus::Closed;
        trade.exit_price = Some(exit_price);
        trade.exit_time = Some(exit_time);
        trade.pnl = pnl;
        trade.pnl_pct = pnl_pct;
        let closed = trade.clone();

        self.capital += pnl;
        if pnl > 0.0 {
            self.winning_trades += 1;
            self.consecutive_losses = 0;
            info!(trade_id = id, pnl, pnl_pct, "Trade closed: win");
        } else {
            self.losing_trades += 1;
            self.consecutive_losses += 1;
            info!(trade_id = id, pnl, pnl_pct, "Trade closed: loss");
        }

        Ok(closed)
    }

    /// All open trades.
    pub fn open_trades(&self) -> Vec<&Trade> {
        self.trades.iter().filter(|t| t.is_open()).collect()
    }

    /// All closed trades.
    pub fn closed_trades(&self) -> Vec<&Trade> {
        self.trades.iter().filter(|t| !t.is_open()).collect()
    }

    /// Session statistics over closed trades. A session with no closed
    /// trades yields the all-zero shape with capital carried through.
    pub fn summary(&self) -> TradeSummary {
        let closed = self.closed_trades();

        if closed.is_empty() {
            return TradeSummary {
                total_trades: 0,
                winning_trades: 0,
                losing_trades: 0,
                win_rate: 0.0,
                total_pnl: 0.0,
                average_pnl: 0.0,
                current_capital: self.capital,
                capital_change: 0.0,
                capital_change_pct: 0.0,
                consecutive_losses: self.consecutive_losses,
                daily_trades: self.daily_trades,
            };
        }

        let total_pnl: f64 = closed.iter().map(|t| t.pnl).sum();
        let capital_change = self.capital - self.initial_capital;
        let capital_change_pct = (capital_change / self.initial_capital) * 100.0;

        TradeSummary {
            total_trades: closed.len(),
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
            win_rate: (self.winning_trades as f64 / closed.len() as f64) * 100.0,
            total_pnl,
            average_pnl: total_pnl / closed.len() as f64,
            current_capital: self.capital,
            capital_change,
            capital_change_pct,
            consecutive_losses: self.consecutive_losses,
            daily_trades: self.daily_trades,
        }
    }

    /// Start a new trading day: zero the daily trade count.
    ///
    /// Consecutive losses are carried over on purpose; the streak breaker
    /// only resets on a winning trade.
    pub fn reset_daily_counters(&mut self) {
        self.daily_trades = 0;
        info!("Daily counters reset");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Pattern;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn signal(side: Side, entry: f64, stop: f64, target: f64) -> Signal {
        Signal {
            symbol: "TEST.NS".to_string(),
            side,
            entry,
            stop_loss: stop,
            target,
            atr: Some(2.0),
            volume_ratio: 1.5,
            pattern: Pattern::Hammer,
            pattern_strength: 0.8,
            ema_fast: entry,
            ema_slow: entry * 0.98,
            vwap: entry * 0.99,
            score: 80.0,
        }
    }

    fn position(quantity: u64) -> Position {
        Position {
            quantity,
            risk_amount: 1000.0,
            risk_per_share: 2.0,
            position_value: quantity as f64 * 100.0,
            risk_pct: 1.0,
            potential_profit: 2000.0,
            risk_reward: 2.0,
        }
    }

    fn manager() -> RiskManager {
        RiskManager::new(100_000.0, RiskConfig::default())
    }

    #[test]
    fn test_trade_ids_are_monotonic() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);
        assert_eq!(rm.add_trade(&s, &position(100), now()), 1);
        assert_eq!(rm.add_trade(&s, &position(100), now()), 2);
        assert_eq!(rm.daily_trades(), 2);
    }

    #[test]
    fn test_close_buy_trade_win() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);
        let id = rm.add_trade(&s, &position(200), now());

        let trade = rm.close_trade(id, 104.0, now()).unwrap();
        assert_eq!(trade.status, TradeStatus::Closed);
        assert!((trade.pnl - 800.0).abs() < 1e-9);
        assert!((trade.pnl_pct - 4.0).abs() < 1e-9);
        assert!((rm.capital() - 100_800.0).abs() < 1e-9);
        assert_eq!(rm.consecutive_losses(), 0);
    }

    #[test]
    fn test_close_sell_trade_pnl_sign() {
        let mut rm = manager();
        let s = signal(Side::Sell, 100.0, 102.0, 96.0);
        let id = rm.add_trade(&s, &position(100), now());

        // Short closed lower is a win
        let trade = rm.close_trade(id, 96.0, now()).unwrap();
        assert!((trade.pnl - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_close_counts_as_loss() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);
        let id = rm.add_trade(&s, &position(100), now());

        let trade = rm.close_trade(id, 100.0, now()).unwrap();
        assert!((trade.pnl - 0.0).abs() < 1e-9);
        assert_eq!(rm.consecutive_losses(), 1);
        assert_eq!(rm.summary().losing_trades, 1);
        assert_eq!(rm.summary().winning_trades, 0);
    }

    #[test]
    fn test_double_close_rejected() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);
        let id = rm.add_trade(&s, &position(100), now());

        rm.close_trade(id, 104.0, now()).unwrap();
        assert_eq!(
            rm.close_trade(id, 104.0, now()).unwrap_err(),
            LedgerError::AlreadyClosed(id)
        );
        assert_eq!(
            rm.close_trade(99, 104.0, now()).unwrap_err(),
            LedgerError::NotFound(99)
        );
    }

    #[test]
    fn test_daily_limit_blocks() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);
        for _ in 0..3 {
            assert!(rm.can_take_trade().is_ok());
            rm.add_trade(&s, &position(10), now());
        }
        assert_eq!(rm.can_take_trade().unwrap_err(), TradeBlock::DailyLimit(3));

        rm.reset_daily_counters();
        assert!(rm.can_take_trade().is_ok());
    }

    #[test]
    fn test_consecutive_loss_breaker() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);

        // Two losses trip the breaker; a third trade is never admitted
        for _ in 0..2 {
            let id = rm.add_trade(&s, &position(10), now());
            rm.close_trade(id, 98.0, now()).unwrap();
        }
        assert_eq!(
            rm.can_take_trade().unwrap_err(),
            TradeBlock::ConsecutiveLosses(2)
        );
    }

    #[test]
    fn test_losses_persist_across_daily_reset() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);
        for _ in 0..2 {
            let id = rm.add_trade(&s, &position(10), now());
            rm.close_trade(id, 98.0, now()).unwrap();
        }

        rm.reset_daily_counters();
        assert_eq!(rm.daily_trades(), 0);
        assert_eq!(rm.consecutive_losses(), 2);
        assert!(rm.can_take_trade().is_err());
    }

    #[test]
    fn test_win_resets_loss_streak() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);

        let id = rm.add_trade(&s, &position(10), now());
        rm.close_trade(id, 98.0, now()).unwrap();
        assert_eq!(rm.consecutive_losses(), 1);

        let id = rm.add_trade(&s, &position(10), now());
        rm.close_trade(id, 104.0, now()).unwrap();
        assert_eq!(rm.consecutive_losses(), 0);
    }

    #[test]
    fn test_capital_floor_blocks() {
        let mut rm = RiskManager::new(100_000.0, RiskConfig::default());
        let s = signal(Side::Buy, 1000.0, 100.0, 1100.0);

        // One catastrophic loss takes capital below 20% of initial
        let id = rm.add_trade(&s, &position(100), now());
        rm.close_trade(id, 150.0, now()).unwrap();
        assert!(rm.capital() < 20_000.0);
        assert!(matches!(
            rm.can_take_trade().unwrap_err(),
            TradeBlock::CapitalFloor(_)
        ));
    }

    #[test]
    fn test_summary_empty_shape() {
        let rm = manager();
        let summary = rm.summary();
        assert_eq!(summary.total_trades, 0);
        assert!((summary.win_rate - 0.0).abs() < 1e-9);
        assert!((summary.total_pnl - 0.0).abs() < 1e-9);
        assert!((summary.current_capital - 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_counts_closed_only() {
        let mut rm = manager();
        let s = signal(Side::Buy, 100.0, 98.0, 104.0);
        let id = rm.add_trade(&s, &position(100), now());
        rm.add_trade(&s, &position(100), now()); // stays open

        rm.close_trade(id, 104.0, now()).unwrap();
        let summary = rm.summary();
        assert_eq!(summary.total_trades, 1);
        assert_eq!(rm.open_trades().len(), 1);
        assert!((summary.win_rate - 100.0).abs() < 1e-9);
        assert!((summary.total_pnl - 400.0).abs() < 1e-9);
    }
}
