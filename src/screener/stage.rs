//! Per-stage outcome tracking.
//!
//! Every filter stage produces survivors plus an explicit skip list, so a
//! symbol dropped anywhere in the funnel is observable with its reason
//! instead of silently disappearing.

use serde::{Deserialize, Serialize};

// ============================================================================
// Filter Stage
// ============================================================================

/// Funnel stage identifier for tracking where symbols are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Pre-market gap filter
    Gap,
    /// Pre-market liquidity filter
    Liquidity,
    /// Pre-market news tagging (annotation only)
    News,
    /// Pre-market composite scoring and top-K selection
    Scoring,
    /// Live-market trend filter
    Trend,
    /// Live-market volume & range filter
    VolumeRange,
    /// Live-market key-level location stage (annotation only)
    Location,
    /// Live-market final ranking and top-M truncation
    Ranking,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gap => write!(f, "gap"),
            Self::Liquidity => write!(f, "liquidity"),
            Self::News => write!(f, "news"),
            Self::Scoring => write!(f, "scoring"),
            Self::Trend => write!(f, "trend"),
            Self::VolumeRange => write!(f, "volume_range"),
            Self::Location => write!(f, "location"),
            Self::Ranking => write!(f, "ranking"),
        }
    }
}

// ============================================================================
// Stage Report
// ============================================================================

/// A symbol dropped at a stage, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSymbol {
    /// Symbol that was dropped
    pub symbol: String,
    /// Why it was dropped (filter miss or data problem)
    pub reason: String,
}

impl SkippedSymbol {
    pub fn new(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

/// Result of one filter stage over its input batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage identifier
    pub stage: FilterStage,
    /// Symbols entering the stage
    pub input: usize,
    /// Symbols surviving the stage
    pub passed: usize,
    /// Symbols dropped, with reasons
    pub skipped: Vec<SkippedSymbol>,
}

impl StageReport {
    pub fn new(stage: FilterStage, input: usize, passed: usize, skipped: Vec<SkippedSymbol>) -> Self {
        Self {
            stage,
            input,
            passed,
            skipped,
        }
    }

    /// Elimination rate (%) for this stage.
    pub fn elimination_rate(&self) -> f64 {
        if self.input == 0 {
            return 0.0;
        }
        (self.input.saturating_sub(self.passed) as f64 / self.input as f64) * 100.0
    }
}

// ============================================================================
// Tests
// ============================================================================
