//! Fixed-fractional position sizing.
//!
//! Quantity is chosen so a stop-loss hit loses `risk_per_trade_pct` of
//! capital, then capped so the position value never exceeds
//! `max_position_pct` of capital. Sizing is a pure function of its inputs;
//! rejections are typed, never panics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RiskConfig;
use crate::signal::Signal;

// ============================================================================
// Position
// ============================================================================

/// Sizing result for one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Whole shares to trade
    pub quantity: u64,
    /// Capital at risk if the stop is hit
    pub risk_amount: f64,
    /// Distance between entry and stop per share
    pub risk_per_share: f64,
    /// Notional value of the position
    pub position_value: f64,
    /// Risk percentage the size was derived from
    pub risk_pct: f64,
    /// Profit if the target is hit
    pub potential_profit: f64,
    /// Potential profit against the risk amount
    pub risk_reward: f64,
}

// ============================================================================
// Sizing Errors
// ============================================================================

/// Structured sizing rejections. These never escape the risk boundary as
/// panics; the caller skips the signal and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    /// Stop-loss equals entry, so risk per share is zero
    #[error("invalid stop-loss: zero risk per share")]
    ZeroRiskPerShare,
    /// The risk budget buys less than one share
    #[error("risk budget too small for one share")]
    ZeroQuantity,
    /// Position value exceeds available capital
    #[error("insufficient capital: position needs {needed:.2}, available {available:.2}")]
    InsufficientCapital { needed: f64, available: f64 },
}

// ============================================================================
// Position Sizer
// ============================================================================

/// Deterministic position sizer.
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Size a position from capital, entry, stop and target.
    ///
    /// `quantity = floor(risk_amount / risk_per_share)`, capped so
    /// `quantity * entry <= max_position_pct% of capital` (quantity is
    /// recomputed from the cap when it binds).
    pub fn size(
        &self,
        capital: f64,
        entry: f64,
        stop_loss: f64,
        target: f64,
    ) -> Result<Position, SizingError> {
        let risk_pct = self.config.risk_per_trade_pct;
        let risk_amount = capital * (risk_pct / 100.0);
        let risk_per_share = (entry - stop_loss).abs();

        if risk_per_share == 0.0 {
            return Err(SizingError::ZeroRiskPerShare);
        }

        let mut quantity = (risk_amount / risk_per_share).floor() as u64;
        let max_position_value = capital * (self.config.max_position_pct / 100.0);

        if quantity as f64 * entry > max_position_value {
            quantity = (max_position_value / entry).floor() as u64;
        }

        if quantity == 0 {
            return Err(SizingError::ZeroQuantity);
        }

        let position_value = quantity as f64 * entry;
        let potential_profit = quantity as f64 * (target - entry).abs();
        let risk_reward = if risk_amount > 0.0 {
            potential_profit / risk_amount
        } else {
            0.0
        };

        Ok(Position {
            quantity,
            risk_amount,
            risk_per_share,
            position_value,
            risk_pct,
            potential_profit,
            risk_reward,
        })
    }

    /// Size a signal and verify the position fits the available capital.
    pub fn validate(&self, signal: &Signal, capital: f64) -> Result<Position, SizingError> {
        let position = self.size(capital, signal.entry, signal.stop_loss, signal.target)?;

        if position.position_value > capital {
            return Err(SizingError::InsufficientCapital {
                needed: position.position_value,
                available: capital,
            });
        }

        Ok(position)
    }
}

// ============================================================================
// Tests
// ============================================================================
