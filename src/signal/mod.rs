//! Signal generation.
//!
//! Evaluates each live-filtered candidate against the 20/200 EMA + VWAP
//! method: a trend-side location check, a pullback to the fast EMA, a
//! reversal candle on the latest bar, and a volume surge. All conditions
//! must hold; any miss rejects the candidate silently. Signals are pure
//! functions of the candidate's bar series and the injected config — no
//! state survives between calls.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{LiveMarketConfig, RiskConfig, SignalConfig};
use crate::data::{closes, Candle};
use crate::indicators::{atr, ema, latest, round2, stop_loss, vwap};
use crate::screener::{IntradayTrend, LiveCandidate};

// ============================================================================
// Signal Types
// ============================================================================

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Whether this side is long.
    pub fn is_long(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Reversal candle pattern on the signal bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Long lower wick, bullish close
    Hammer,
    /// Current body fully contains the previous opposite body
    Engulfing,
    /// Long upper wick, bearish close
    ShootingStar,
    /// Plain strong bullish candle
    BullishCandle,
    /// Plain strong bearish candle
    BearishCandle,
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hammer => write!(f, "hammer"),
            Self::Engulfing => write!(f, "engulfing"),
            Self::ShootingStar => write!(f, "shooting_star"),
            Self::BullishCandle => write!(f, "bullish_candle"),
            Self::BearishCandle => write!(f, "bearish_candle"),
        }
    }
}

/// A detected reversal candle with its strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReversalCandle {
    /// Pattern name
    pub pattern: Pattern,
    /// Strength in [0, 1]
    pub strength: f64,
}

/// A directional trade proposal. Immutable once produced; consumed exactly
/// once by the risk manager.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    /// Symbol
    pub symbol: String,
    /// Direction
    pub side: Side,
    /// Entry price (latest close)
    pub entry: f64,
    /// ATR-based stop
    pub stop_loss: f64,
    /// Reward-ratio target
    pub target: f64,
    /// ATR at signal time (undefined stops collapse onto the entry and are
    /// rejected later by sizing)
    pub atr: Option<f64>,
    /// Signal-bar volume against the trailing baseline
    pub volume_ratio: f64,
    /// Detected reversal pattern
    pub pattern: Pattern,
    /// Pattern strength in [0, 1]
    pub pattern_strength: f64,
    /// Fast EMA snapshot
    pub ema_fast: f64,
    /// Slow EMA snapshot
    pub ema_slow: f64,
    /// VWAP snapshot
    pub vwap: f64,
    /// Quality score (0-100)
    pub score: f64,
}

// ============================================================================
// Signal Generator
// ============================================================================

/// Rule-based BUY/SELL signal generator.
///
/// Carries the live-market EMA periods so its recomputed series line up
/// with the snapshots already on the candidate.
pub struct SignalGenerator {
    config: SignalConfig,
    live: LiveMarketConfig,
    risk: RiskConfig,
}

impl SignalGenerator {
    pub fn new(config: SignalConfig, live: LiveMarketConfig, risk: RiskConfig) -> Self {
        Self { config, live, risk }
    }

    /// Evaluate every live candidate, best quality first.
    pub fn generate(&self, candidates: &[LiveCandidate]) -> Vec<Signal> {
        let mut signals = Vec::new();

        for candidate in candidates {
            let signal = match candidate.trend {
                IntradayTrend::Bullish => self.evaluate(candidate, Side::Buy),
                IntradayTrend::Bearish => self.evaluate(candidate, Side::Sell),
                IntradayTrend::Mixed => {
                    warn!(symbol = candidate.symbol(), "Mixed-trend candidate reached signal stage");
                    None
                }
            };

            if let Some(signal) = signal {
                info!(
                    symbol = %signal.symbol,
                    side = %signal.side,
                    score = signal.score,
                    pattern = %signal.pattern,
                    "Signal generated"
                );
                signals.push(signal);
            }
        }

        signals.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        signals
    }

    /// Evaluate the multi-condition entry rule for one side.
    fn evaluate(&self, candidate: &LiveCandidate, side: Side) -> Option<Signal> {
        let bars = &candidate.bars;
        if bars.len() < 5 {
            return None;
        }

        let close_series = closes(bars);
        let ema_fast_series = ema(&close_series, self.live.ema_fast);
        let ema_slow_series = ema(&close_series, self.live.ema_slow);
        let vwap_series = vwap(bars);
        let atr_series = atr(bars, self.risk.atr_period);

        let price = close_series[close_series.len() - 1];
        let ema_fast = latest(&ema_fast_series)?;
        let ema_slow = latest(&ema_slow_series)?;
        let vwap_now = latest(&vwap_series)?;
        let atr_now = latest(&atr_series);

        // Trend-side location: price strictly beyond the slow EMA and VWAP
        let on_side = match side {
            Side::Buy => price > ema_slow && price > vwap_now,
            Side::Sell => price < ema_slow && price < vwap_now,
        };
        if !on_side {
            debug!(symbol = candidate.symbol(), %side, "Rejected: wrong side of EMA/VWAP");
            return None;
        }

        // Pullback: close to the fast EMA now, or touched it recently
        let distance_pct = ((price - ema_fast) / price).abs() * 100.0;
        if distance_pct > self.config.pullback_pct
            && !touched_fast_ema(bars, &ema_fast_series, self.config.pullback_lookback)
        {
            debug!(symbol = candidate.symbol(), distance_pct, "Rejected: no pullback");
            return None;
        }

        // Reversal candle on the latest bar
        let reversal = detect_reversal(bars, side)?;

        // Volume confirmation
        let volume_ratio = signal_volume_ratio(bars, self.config.volume_lookback);
        if volume_ratio < self.config.min_volume_ratio {
            debug!(symbol = candidate.symbol(), volume_ratio, "Rejected: weak volume");
            return None;
        }

        let stop = stop_loss(
            price,
            atr_now,
            self.risk.stop_loss_atr_multiplier,
            side.is_long(),
        );
        let risk = (price - stop).abs();
        let target = match side {
            Side::Buy => round2(price + risk * self.risk.reward_ratio),
            Side::Sell => round2(price - risk * self.risk.reward_ratio),
        };

        let mut signal = Signal {
            symbol: candidate.symbol().to_string(),
            side,
            entry: price,
            stop_loss: stop,
            target,
            atr: atr_now,
            volume_ratio,
            pattern: reversal.pattern,
            pattern_strength: reversal.strength,
            ema_fast,
            ema_slow,
            vwap: vwap_now,
            score: 0.0,
        };
        signal.score = score_signal(&signal);
        Some(signal)
    }
}

// ============================================================================
// Reversal Candle Detection
// ============================================================================

/// Detect a reversal candle on the latest bar (the previous bar feeds the
/// engulfing check). Returns `None` when no pattern matches the requested
/// side.
pub fn detect_reversal(bars: &[Candle], side: Side) -> Option<ReversalCandle> {
    if bars.len() < 2 {
        return None;
    }

    let current = &bars[bars.len() - 1];
    let previous = &bars[bars.len() - 2];

    let body = current.body_size();
    let upper_wick = current.upper_wick();
    let lower_wick = current.lower_wick();
    let total_range = current.range();

    if total_range == 0.0 {
        return None;
    }

    match side {
        Side::Buy => {
            if lower_wick > 2.0 * body && upper_wick < body * 0.5 && current.is_bullish() {
                Some(ReversalCandle {
                    pattern: Pattern::Hammer,
                    strength: 0.8,
                })
            } else if current.is_bullish()
                && previous.is_bearish()
                && current.close > previous.open
                && current.open < previous.close
            {
                Some(ReversalCandle {
                    pattern: Pattern::Engulfing,
                    strength: 0.9,
                })
            } else if current.is_bullish() && body > total_range * 0.6 {
                Some(ReversalCandle {
                    pattern: Pattern::BullishCandle,
                    strength: 0.6,
                })
            } else {
                None
            }
        }
        Side::Sell => {
            if upper_wick > 2.0 * body && lower_wick < body * 0.5 && current.is_bearish() {
                Some(ReversalCandle {
                    pattern: Pattern::ShootingStar,
                    strength: 0.8,
                })
            } else if current.is_bearish()
                && previous.is_bullish()
                && current.close < previous.open
                && current.open > previous.close
            {
                Some(ReversalCandle {
                    pattern: Pattern::Engulfing,
                    strength: 0.9,
                })
            } else if current.is_bearish() && body > total_range * 0.6 {
                Some(ReversalCandle {
                    pattern: Pattern::BearishCandle,
                    strength: 0.6,
                })
            } else {
                None
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Whether any of the last `lookback` bars spanned its own fast-EMA value.
fn touched_fast_ema(bars: &[Candle], ema_series: &[Option<f64>], lookback: usize) -> bool {
    let n = bars.len();
    bars.iter()
        .zip(ema_series)
        .skip(n.saturating_sub(lookback))
        .any(|(bar, ema)| ema.map(|e| bar.low <= e && e <= bar.high).unwrap_or(false))
}

/// Signal-bar volume against the mean of the `lookback` bars before it.
///
/// Defaults to 1.0 when the series is too short.
fn signal_volume_ratio(bars: &[Candle], lookback: usize) -> f64 {
    if bars.len() < lookback + 1 {
        return 1.0;
    }

    let current = bars[bars.len() - 1].volume;
    let baseline = &bars[bars.len() - 1 - lookback..bars.len() - 1];
    let avg = baseline.iter().map(|c| c.volume).sum::<f64>() / lookback as f64;

    if avg > 0.0 {
        current / avg
    } else {
        0.0
    }
}

// ============================================================================
// Quality Scoring
// ============================================================================

/// Quality score (0-100): trend distance up to 30, volume surge up to 25,
/// pattern strength up to 25, risk-reward up to 20.
fn score_signal(signal: &Signal) -> f64 {
    let mut score = 0.0;

    let distance_from_slow = ((signal.entry - signal.ema_slow) / signal.ema_slow).abs() * 100.0;
    score += if distance_from_slow > 2.0 {
        30.0
    } else if distance_from_slow > 1.0 {
        20.0
    } else {
        10.0
    };

    score += if signal.volume_ratio > 2.0 {
        25.0
    } else if signal.volume_ratio > 1.5 {
        20.0
    } else if signal.volume_ratio > 1.2 {
        15.0
    } else {
        10.0
    };

    score += signal.pattern_strength * 25.0;

    let risk = (signal.entry - signal.stop_loss).abs();
    let reward = (signal.target - signal.entry).abs();
    let rr = if risk > 0.0 { reward / risk } else { 0.0 };
    score += if rr >= 2.0 {
        20.0
    } else if rr >= 1.5 {
        15.0
    } else {
        10.0
    };

    score.min(100.0)
}

// ============================================================================
// Tests
// ============================================================================
