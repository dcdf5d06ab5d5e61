//! Exit models for backtest trade resolution.
//!
//! The driver resolves each trade immediately after entry; how the exit
//! price is chosen is a strategy behind `ExitModel`. The Monte-Carlo model
//! is the default; the deterministic models exist for tests and as the
//! seam where a real intraday-replay exit would plug in.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::signal::Signal;

// ============================================================================
// Exit Model Trait
// ============================================================================

/// Strategy for resolving a trade's exit price.
pub trait ExitModel: Send {
    /// Choose the exit price for a just-opened trade.
    fn resolve(&mut self, signal: &Signal) -> f64;
}

// ============================================================================
// Monte-Carlo Exit
// ============================================================================

/// Bernoulli exit: hit the target with probability `win_probability`,
/// otherwise hit the stop.
///
/// The fixed win probability is a modeling simplification, not a contract
/// derived from data.
pub struct MonteCarloExit {
    win_probability: f64,
    rng: StdRng,
}

impl MonteCarloExit {
    /// Create a model with an entropy-seeded RNG.
    pub fn new(win_probability: f64) -> Self {
        Self {
            win_probability,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a model with a fixed seed for reproducible runs.
    pub fn with_seed(win_probability: f64, seed: u64) -> Self {
        Self {
            win_probability,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ExitModel for MonteCarloExit {
    fn resolve(&mut self, signal: &Signal) -> f64 {
        if self.rng.gen_bool(self.win_probability.clamp(0.0, 1.0)) {
            signal.target
        } else {
            signal.stop_loss
        }
    }
}

// ============================================================================
// Deterministic Exits
// ============================================================================

/// Every trade hits its target.
pub struct AlwaysTarget;

impl ExitModel for AlwaysTarget {
    fn resolve(&mut self, signal: &Signal) -> f64 {
        signal.target
    }
}

/// Every trade hits its stop.
pub struct AlwaysStop;

impl ExitModel for AlwaysStop {
    fn resolve(&mut self, signal: &Signal) -> f64 {
        signal.stop_loss
    }
}

// ============================================================================
// Tests
// ============================================================================
