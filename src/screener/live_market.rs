//! Live-market filter.
//!
//! Refines pre-market candidates once intraday bars exist: trend filter
//! (slow EMA + VWAP) → volume & range filter → key-level location
//! annotation → ranking. The trend and volume stages reject; the location
//! stage only annotates. There is no fallback to daily bars — a symbol
//! without enough intraday history is skipped.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{LiveMarketConfig, MarketConfig};
use crate::data::{closes, Candle, MarketData};
use crate::indicators::{ema, latest, vwap};

use super::pre_market::Candidate;
use super::stage::{FilterStage, SkippedSymbol, StageReport};

const MAX_CONCURRENT_FETCHES: usize = 8;

// ============================================================================
// Live Candidate
// ============================================================================

/// Intraday trend classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntradayTrend {
    /// price above slow EMA and VWAP
    Bullish,
    /// price below slow EMA and VWAP
    Bearish,
    /// Neither; dropped by the trend filter
    Mixed,
}

impl std::fmt::Display for IntradayTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

/// Kind of price level a candidate is trading near.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyLevelKind {
    YesterdayHigh,
    YesterdayLow,
    OpeningRangeHigh,
    OpeningRangeLow,
    SwingHigh,
    SwingLow,
}

/// Nearest key level within the proximity threshold.
#[derive(Debug, Clone, Serialize)]
pub struct KeyLevel {
    /// Level kind
    pub kind: KeyLevelKind,
    /// Level price
    pub price: f64,
    /// Distance from the current price (%)
    pub distance_pct: f64,
}

/// A candidate that survived live-market filtering.
///
/// Embeds the pre-market record; the attached bar series feeds signal
/// generation and is not serialized.
#[derive(Debug, Clone, Serialize)]
pub struct LiveCandidate {
    /// Pre-market screening record
    pub candidate: Candidate,
    /// Intraday trend (never `Mixed` for survivors)
    pub trend: IntradayTrend,
    /// Distance of price from the slow EMA (%)
    pub trend_strength: f64,
    /// Latest intraday price
    pub price: f64,
    /// Fast EMA snapshot
    pub ema_fast: f64,
    /// Slow EMA snapshot
    pub ema_slow: f64,
    /// VWAP snapshot
    pub vwap: f64,
    /// Latest-bar volume against the trailing baseline
    pub volume_ratio: f64,
    /// Session range as % of price
    pub range_pct: f64,
    /// Session high
    pub today_high: f64,
    /// Session low
    pub today_low: f64,
    /// Opening-range high
    pub opening_range_high: f64,
    /// Opening-range low
    pub opening_range_low: f64,
    /// Previous session high
    pub yesterday_high: f64,
    /// Previous session low
    pub yesterday_low: f64,
    /// Nearest key level within the proximity threshold
    pub key_level: Option<KeyLevel>,
    /// Intraday bar series for signal generation
    #[serde(skip_serializing)]
    pub bars: Vec<Candle>,
}

impl LiveCandidate {
    /// Symbol shorthand.
    pub fn symbol(&self) -> &str {
        self.candidate.symbol()
    }
}

/// Result of one live-market filtering run.
#[derive(Debug, Clone, Serialize)]
pub struct LiveOutcome {
    /// Trading date filtered
    pub date: NaiveDate,
    /// Final candidates, strongest trend first
    pub candidates: Vec<LiveCandidate>,
    /// Per-stage survivor/skip accounting
    pub stages: Vec<StageReport>,
}

// ============================================================================
// Live-Market Filter
// ============================================================================

/// The live-market filtering engine.
pub struct LiveMarketFilter<D: MarketData> {
    config: LiveMarketConfig,
    market: MarketConfig,
    store: Arc<D>,
}

impl<D: MarketData> LiveMarketFilter<D> {
    pub fn new(config: LiveMarketConfig, market: MarketConfig, store: Arc<D>) -> Self {
        Self {
            config,
            market,
            store,
        }
    }

    /// Run the complete live-market workflow over pre-market candidates.
    pub async fn run(&self, candidates: Vec<Candidate>, date: NaiveDate) -> Result<LiveOutcome> {
        info!(%date, input = candidates.len(), "Running live-market filtering");
        let mut stages = Vec::new();

        if candidates.is_empty() {
            warn!("No pre-market candidates to filter");
            return Ok(LiveOutcome {
                date,
                candidates: Vec::new(),
                stages,
            });
        }

        let (trending, trend_report) = self.trend_filter(candidates, date).await;
        info!(
            passed = trend_report.passed,
            skipped = trend_report.skipped.len(),
            "Trend filter complete"
        );
        stages.push(trend_report);

        let (active, volume_report) = self.volume_range_filter(trending);
        info!(
            passed = volume_report.passed,
            skipped = volume_report.skipped.len(),
            "Volume & range filter complete"
        );
        stages.push(volume_report);

        let (located, location_report) = self.location_annotate(active).await;
        stages.push(location_report);

        let (selected, ranking_report) = self.rank_and_truncate(located);
        stages.push(ranking_report);

        info!(selected = selected.len(), "Live-market filtering complete");

        Ok(LiveOutcome {
            date,
            candidates: selected,
            stages,
        })
    }

    // ========================================================================
    // Stage 1: Trend Filter
    // ========================================================================

    async fn trend_filter(
        &self,
        candidates: Vec<Candidate>,
        date: NaiveDate,
    ) -> (Vec<LiveCandidate>, StageReport) {
        let input = candidates.len();

        let results: Vec<(String, Result<LiveCandidate, String>)> =
            futures::stream::iter(candidates.into_iter().map(|candidate| {
                let store = Arc::clone(&self.store);
                let config = self.config.clone();
                let market = self.market;
                async move {
                    let symbol = candidate.symbol().to_string();
                    let outcome =
                        classify_trend(store.as_ref(), candidate, date, &config, &market).await;
                    (symbol, outcome)
                }
            }))
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let mut passed = Vec::new();
        let mut skipped = Vec::new();
        for (symbol, outcome) in results {
            match outcome {
                Ok(live) => passed.push(live),
                Err(reason) => {
                    debug!(symbol = %symbol, reason = %reason, "Symbol dropped at trend filter");
                    skipped.push(SkippedSymbol::new(symbol, reason));
                }
            }
        }

        let report = StageReport::new(FilterStage::Trend, input, passed.len(), skipped);
        (passed, report)
    }

    // ========================================================================
    // Stage 2: Volume & Range Filter
    // ========================================================================

    fn volume_range_filter(
        &self,
        candidates: Vec<LiveCandidate>,
    ) -> (Vec<LiveCandidate>, StageReport) {
        let input = candidates.len();
        let mut passed = Vec::new();
        let mut skipped = Vec::new();

        for mut live in candidates {
            let volume_ratio = latest_volume_ratio(&live.bars, self.config.volume_lookback);

            let today_high = live.bars.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let today_low = live.bars.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let range_pct = (today_high - today_low) / live.price * 100.0;

            if volume_ratio < self.config.min_volume_ratio {
                skipped.push(SkippedSymbol::new(
                    live.symbol(),
                    format!("volume ratio {:.2} below {:.2}", volume_ratio, self.config.min_volume_ratio),
                ));
                continue;
            }
            if range_pct < self.config.min_range_pct {
                skipped.push(SkippedSymbol::new(
                    live.symbol(),
                    format!("range {:.2}% below {:.2}%", range_pct, self.config.min_range_pct),
                ));
                continue;
            }

            debug!(
                symbol = live.symbol(),
                volume_ratio,
                range_pct,
                "Volume & range accepted"
            );

            live.volume_ratio = volume_ratio;
            live.range_pct = range_pct;
            live.today_high = today_high;
            live.today_low = today_low;
            passed.push(live);
        }

        let report = StageReport::new(FilterStage::VolumeRange, input, passed.len(), skipped);
        (passed, report)
    }

    // ========================================================================
    // Stage 3: Location Annotation
    // ========================================================================

    /// Attach the nearest key level. Candidates without a nearby level
    /// still pass; only a data failure drops one.
    async fn location_annotate(
        &self,
        candidates: Vec<LiveCandidate>,
    ) -> (Vec<LiveCandidate>, StageReport) {
        let input = candidates.len();
        let mut passed = Vec::new();
        let mut skipped = Vec::new();

        for mut live in candidates {
            let daily = match self.store.daily_bars(live.symbol(), 5).await {
                Ok(bars) => bars,
                Err(e) => {
                    skipped.push(SkippedSymbol::new(
                        live.symbol(),
                        format!("daily data unavailable: {}", e),
                    ));
                    continue;
                }
            };

            // Yesterday's levels; fall back to a +/-2% band when history is
            // too short to know them.
            let (yesterday_high, yesterday_low) = if daily.len() >= 2 {
                let y = &daily[daily.len() - 2];
                (y.high, y.low)
            } else {
                (live.price * 1.02, live.price * 0.98)
            };

            let opening = &live.bars[..self.config.opening_range_bars.min(live.bars.len())];
            let opening_range_high = opening.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let opening_range_low = opening.iter().map(|c| c.low).fold(f64::MAX, f64::min);

            let mut levels = vec![
                (KeyLevelKind::YesterdayHigh, yesterday_high),
                (KeyLevelKind::YesterdayLow, yesterday_low),
                (KeyLevelKind::OpeningRangeHigh, opening_range_high),
                (KeyLevelKind::OpeningRangeLow, opening_range_low),
            ];
            let (swing_highs, swing_lows) = swing_points(&live.bars);
            levels.extend(
                swing_highs
                    .iter()
                    .rev()
                    .take(3)
                    .map(|p| (KeyLevelKind::SwingHigh, *p)),
            );
            levels.extend(
                swing_lows
                    .iter()
                    .rev()
                    .take(3)
                    .map(|p| (KeyLevelKind::SwingLow, *p)),
            );

            live.key_level = nearest_level(live.price, &levels, self.config.proximity_pct);
            live.yesterday_high = yesterday_high;
            live.yesterday_low = yesterday_low;
            live.opening_range_high = opening_range_high;
            live.opening_range_low = opening_range_low;
            passed.push(live);
        }

        let report = StageReport::new(FilterStage::Location, input, passed.len(), skipped);
        (passed, report)
    }

    // ========================================================================
    // Stage 4: Ranking
    // ========================================================================

    fn rank_and_truncate(
        &self,
        mut candidates: Vec<LiveCandidate>,
    ) -> (Vec<LiveCandidate>, StageReport) {
        let input = candidates.len();

        candidates.sort_by(|a, b| {
            b.trend_strength
                .partial_cmp(&a.trend_strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.volume_ratio
                        .partial_cmp(&a.volume_ratio)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        let skipped = candidates
            .iter()
            .skip(self.config.max_candidates)
            .map(|c| SkippedSymbol::new(c.symbol(), "below top-M cutoff"))
            .collect();
        candidates.truncate(self.config.max_candidates);

        let report = StageReport::new(FilterStage::Ranking, input, candidates.len(), skipped);
        (candidates, report)
    }
}

// ============================================================================
// Per-Symbol Trend Classification
// ============================================================================

async fn classify_trend<D: MarketData + ?Sized>(
    store: &D,
    candidate: Candidate,
    date: NaiveDate,
    config: &LiveMarketConfig,
    market: &MarketConfig,
) -> Result<LiveCandidate, String> {
    let bars = store
        .minute_bars(candidate.symbol(), date, market.open_time, market.close_time)
        .await
        .map_err(|e| format!("minute data unavailable: {}", e))?;

    if bars.len() < config.ema_slow {
        return Err(format!(
            "insufficient intraday bars ({} < {})",
            bars.len(),
            config.ema_slow
        ));
    }

    let close_series = closes(&bars);
    let ema_fast_series = ema(&close_series, config.ema_fast);
    let ema_slow_series = ema(&close_series, config.ema_slow);
    let vwap_series = vwap(&bars);

    let price = close_series[close_series.len() - 1];
    let (Some(ema_fast), Some(ema_slow), Some(vwap)) = (
        latest(&ema_fast_series),
        latest(&ema_slow_series),
        latest(&vwap_series),
    ) else {
        return Err("indicators undefined".to_string());
    };

    let (trend, trend_strength) = if price > ema_slow && price > vwap {
        (IntradayTrend::Bullish, (price - ema_slow) / ema_slow * 100.0)
    } else if price < ema_slow && price < vwap {
        (IntradayTrend::Bearish, (ema_slow - price) / ema_slow * 100.0)
    } else {
        return Err("mixed trend".to_string());
    };

    Ok(LiveCandidate {
        candidate,
        trend,
        trend_strength,
        price,
        ema_fast,
        ema_slow,
        vwap,
        volume_ratio: 0.0,
        range_pct: 0.0,
        today_high: 0.0,
        today_low: 0.0,
        opening_range_high: 0.0,
        opening_range_low: 0.0,
        yesterday_high: 0.0,
        yesterday_low: 0.0,
        key_level: None,
        bars,
    })
}

// ============================================================================
// Helpers
// ============================================================================

/// Latest-bar volume against the mean of the preceding `lookback` bars.
///
/// Defaults to 1.0 when the series is too short to form a baseline.
fn latest_volume_ratio(bars: &[Candle], lookback: usize) -> f64 {
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

/// Swing highs/lows: bars strictly above/below both neighbors on each side.
fn swing_points(bars: &[Candle]) -> (Vec<f64>, Vec<f64>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();

    if bars.len() < 5 {
        return (highs, lows);
    }

    for i in 2..bars.len() - 2 {
        let h = bars[i].high;
        if h > bars[i - 1].high && h > bars[i - 2].high && h > bars[i + 1].high && h > bars[i + 2].high
        {
            highs.push(h);
        }
        let l = bars[i].low;
        if l < bars[i - 1].low && l < bars[i - 2].low && l < bars[i + 1].low && l < bars[i + 2].low {
            lows.push(l);
        }
    }

    (highs, lows)
}

/// Nearest level within `proximity_pct` of the price, if any.
fn nearest_level(
    price: f64,
    levels: &[(KeyLevelKind, f64)],
    proximity_pct: f64,
) -> Option<KeyLevel> {
    let mut nearest: Option<KeyLevel> = None;

    for (kind, level) in levels {
        let distance_pct = ((price - level) / price).abs() * 100.0;
        if distance_pct > proximity_pct {
            continue;
        }
        let closer = nearest
            .as_ref()
            .map(|n| distance_pct < n.distance_pct)
            .unwrap_or(true);
        if closer {
            nearest = Some(KeyLevel {
                kind: *kind,
                price: *level,
                distance_pct,
            });
        }
    }

    nearest
}

// ============================================================================
// Tests
// ============================================================================
