//! Classifier collaborator interface.
//!
//! The training/feature pipeline lives outside this crate; the core only
//! knows how to ask an opaque model for a per-symbol prediction and how to
//! re-rank signals with it. Without a predictor the funnel's own quality
//! ordering stands.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signal::{Side, Signal};

// ============================================================================
// Prediction Types
// ============================================================================

/// Predicted short-term direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictedDirection {
    Up,
    Down,
}

/// A classifier's opinion on one symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted direction
    pub direction: PredictedDirection,
    /// Probability of an upward move, in [0, 1]
    pub probability: f64,
    /// Model confidence (distance from a coin flip), in [0, 1]
    pub confidence: f64,
}

/// Trait for the external classifier.
pub trait Predictor: Send + Sync {
    /// Predict the movement of `symbol`; `None` when the model has no
    /// opinion (untrained, insufficient data).
    fn predict(&self, symbol: &str) -> Option<Prediction>;
}

// ============================================================================
// Re-Ranking
// ============================================================================

/// Model score for one signal (0-100): probability of the predicted
/// direction, weighted by confidence. Signals the model has no opinion on
/// score 0 and sort last.
pub fn model_score(signal: &Signal, predictor: &dyn Predictor) -> f64 {
    let Some(prediction) = predictor.predict(&signal.symbol) else {
        return 0.0;
    };

    let directional_probability = match prediction.direction {
        PredictedDirection::Up => prediction.probability,
        PredictedDirection::Down => 1.0 - prediction.probability,
    };

    directional_probability * prediction.confidence * 100.0
}

/// Re-rank signals by model score, best first.
///
/// The ranking ignores whether the predicted direction matches the
/// signal's side; a disagreeing prediction still carries information and
/// surfaces in the score of the opposite-side candidates.
pub fn rerank(signals: &mut [Signal], predictor: &dyn Predictor) {
    signals.sort_by(|a, b| {
        let sa = model_score(a, predictor);
        let sb = model_score(b, predictor);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });

    for signal in signals.iter() {
        debug!(
            symbol = %signal.symbol,
            side = %signal.side,
            model_score = model_score(signal, predictor),
            "Model re-rank"
        );
    }
}

/// Whether a prediction agrees with a signal's direction.
pub fn agrees(side: Side, prediction: &Prediction) -> bool {
    matches!(
        (side, prediction.direction),
        (Side::Buy, PredictedDirection::Up) | (Side::Sell, PredictedDirection::Down)
    )
}

// ============================================================================
// Tests
// ============================================================================
