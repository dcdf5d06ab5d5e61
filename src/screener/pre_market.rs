//! Pre-market screener.
//!
//! Narrows the universe before the open: index trend context → gap filter
//! → liquidity filter → news tagging → composite scoring → top-K
//! selection. Gap alignment with the primary index partitions the sort
//! strictly; it is never blended into a weighted score at this stage.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{MarketConfig, PreMarketConfig};
use crate::data::{closes, MarketData, NewsEvent, NewsSource};
use crate::indicators::{ema, latest, round2, trend_of, Trend};

use super::stage::{FilterStage, SkippedSymbol, StageReport};

/// Bounded fan-out for per-symbol data fetches.
const MAX_CONCURRENT_FETCHES: usize = 8;

// ============================================================================
// Index Context
// ============================================================================

/// Daily-chart trend context for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexContext {
    /// Index symbol
    pub symbol: String,
    /// Classified trend from fast/slow EMA
    pub trend: Trend,
    /// Latest close
    pub price: f64,
    /// Fast EMA value
    pub ema_fast: Option<f64>,
    /// Slow EMA value
    pub ema_slow: Option<f64>,
    /// Day-over-day change (%)
    pub change_pct: f64,
    /// Latest session high
    pub yesterday_high: f64,
    /// Latest session low
    pub yesterday_low: f64,
}

// ============================================================================
// Candidate Records
// ============================================================================

/// Direction of an opening gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapDirection {
    Up,
    Down,
}

/// A symbol that passed the gap filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapCandidate {
    /// Symbol
    pub symbol: String,
    /// Early price used for the gap measurement
    pub price: f64,
    /// Previous day's close
    pub prev_close: f64,
    /// Gap (%), signed
    pub gap_pct: f64,
    /// Gap direction
    pub direction: GapDirection,
    /// Whether the gap direction matches the primary index trend
    pub aligned_with_index: bool,
}

/// A fully screened pre-market candidate.
///
/// Embeds the gap-stage record; later stages only add fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Gap-stage record
    pub gap: GapCandidate,
    /// Average daily volume over the lookback window
    pub avg_volume: f64,
    /// Volume traded in the early window
    pub early_volume: f64,
    /// Early volume against the per-bucket expectation
    pub early_volume_ratio: f64,
    /// Attached news event, if any
    pub news: Option<NewsEvent>,
    /// Composite score (0-100)
    pub score: f64,
}

impl Candidate {
    /// Symbol shorthand.
    pub fn symbol(&self) -> &str {
        &self.gap.symbol
    }
}

/// Result of one pre-market screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreMarketOutcome {
    /// Trading date screened
    pub date: NaiveDate,
    /// Index trend context (one entry per configured index)
    pub index_context: Vec<IndexContext>,
    /// Final candidates, best score first
    pub candidates: Vec<Candidate>,
    /// Per-stage survivor/skip accounting
    pub stages: Vec<StageReport>,
}

// ============================================================================
// Pre-Market Screener
// ============================================================================

/// The pre-market screening engine.
pub struct PreMarketScreener<D: MarketData> {
    config: PreMarketConfig,
    market: MarketConfig,
    universe: Vec<String>,
    indices: Vec<String>,
    store: Arc<D>,
    news: Arc<dyn NewsSource>,
}

impl<D: MarketData> PreMarketScreener<D> {
    pub fn new(
        config: PreMarketConfig,
        market: MarketConfig,
        universe: Vec<String>,
        indices: Vec<String>,
        store: Arc<D>,
        news: Arc<dyn NewsSource>,
    ) -> Self {
        Self {
            config,
            market,
            universe,
            indices,
            store,
            news,
        }
    }

    /// Run the complete pre-market workflow for one trading date.
    pub async fn run(&self, date: NaiveDate) -> Result<PreMarketOutcome> {
        info!(%date, universe = self.universe.len(), "Running pre-market screening");

        let index_context = self.index_context(date).await;
        let primary_trend = index_context
            .first()
            .map(|c| c.trend)
            .unwrap_or(Trend::Sideways);

        let mut stages = Vec::new();

        let (gap_candidates, gap_report) = self.gap_filter(date, primary_trend).await;
        info!(
            passed = gap_report.passed,
            skipped = gap_report.skipped.len(),
            "Gap filter complete"
        );
        stages.push(gap_report);

        if gap_candidates.is_empty() {
            warn!(%date, "No stocks with valid gaps");
            return Ok(PreMarketOutcome {
                date,
                index_context,
                candidates: Vec::new(),
                stages,
            });
        }

        let (liquid, liquidity_report) = self.liquidity_filter(date, gap_candidates).await;
        info!(
            passed = liquidity_report.passed,
            skipped = liquidity_report.skipped.len(),
            "Liquidity filter complete"
        );
        stages.push(liquidity_report);

        if liquid.is_empty() {
            warn!(%date, "No liquid stocks after gap filter");
            return Ok(PreMarketOutcome {
                date,
                index_context,
                candidates: Vec::new(),
                stages,
            });
        }

        let (tagged, news_report) = self.news_tagging(date, liquid);
        stages.push(news_report);

        let (candidates, scoring_report) = self.score_and_select(tagged);
        stages.push(scoring_report);

        info!(selected = candidates.len(), "Pre-market screening complete");

        Ok(PreMarketOutcome {
            date,
            index_context,
            candidates,
            stages,
        })
    }

    // ========================================================================
    // Stage 1: Index Context
    // ========================================================================

    /// Classify the daily trend for each configured index.
    ///
    /// An index with missing data is skipped; alignment then falls back to
    /// sideways, which simply disables the alignment bonus.
    pub async fn index_context(&self, date: NaiveDate) -> Vec<IndexContext> {
        let mut context = Vec::with_capacity(self.indices.len());

        for symbol in &self.indices {
            let bars = match self
                .store
                .daily_bars(symbol, self.config.index_lookback_days)
                .await
            {
                Ok(bars) if !bars.is_empty() => bars,
                Ok(_) => {
                    warn!(symbol = %symbol, "No daily data for index");
                    continue;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Failed to load index data");
                    continue;
                }
            };

            let close_series = closes(&bars);
            let ema_fast = latest(&ema(&close_series, self.config.index_ema_fast));
            let ema_slow = latest(&ema(&close_series, self.config.index_ema_slow));

            let last = &bars[bars.len() - 1];
            let price = last.close;
            let trend = trend_of(price, ema_fast, ema_slow);

            let change_pct = if bars.len() >= 2 {
                let prev = bars[bars.len() - 2].close;
                ((price - prev) / prev) * 100.0
            } else {
                0.0
            };

            info!(symbol = %symbol, %trend, price, change_pct, "Index context");

            context.push(IndexContext {
                symbol: symbol.clone(),
                trend,
                price,
                ema_fast,
                ema_slow,
                change_pct,
                yesterday_high: last.high,
                yesterday_low: last.low,
            });
        }

        context
    }

    // ========================================================================
    // Stage 2: Gap Filter
    // ========================================================================

    async fn gap_filter(
        &self,
        date: NaiveDate,
        index_trend: Trend,
    ) -> (Vec<GapCandidate>, StageReport) {
        let input = self.universe.len();

        let results: Vec<(String, Result<GapCandidate, String>)> =
            futures::stream::iter(self.universe.iter().cloned().map(|symbol| {
                let store = Arc::clone(&self.store);
                let config = self.config.clone();
                let market = self.market;
                async move {
                    let outcome =
                        check_gap(store.as_ref(), &symbol, date, &config, &market, index_trend)
                            .await;
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
                Ok(candidate) => passed.push(candidate),
                Err(reason) => {
                    debug!(symbol = %symbol, reason = %reason, "Symbol dropped at gap filter");
                    skipped.push(SkippedSymbol::new(symbol, reason));
                }
            }
        }

        // Alignment first, then gap size: a strict partition, not a blend.
        passed.sort_by(|a, b| {
            b.aligned_with_index
                .cmp(&a.aligned_with_index)
                .then_with(|| {
                    b.gap_pct
                        .abs()
                        .partial_cmp(&a.gap_pct.abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        let report = StageReport::new(FilterStage::Gap, input, passed.len(), skipped);
        (passed, report)
    }

    // ========================================================================
    // Stage 3: Liquidity Filter
    // ========================================================================

    async fn liquidity_filter(
        &self,
        date: NaiveDate,
        candidates: Vec<GapCandidate>,
    ) -> (Vec<Candidate>, StageReport) {
        let input = candidates.len();

        let results: Vec<(String, Result<Candidate, String>)> =
            futures::stream::iter(candidates.into_iter().map(|gap| {
                let store = Arc::clone(&self.store);
                let config = self.config.clone();
                let market = self.market;
                async move {
                    let symbol = gap.symbol.clone();
                    let outcome =
                        check_liquidity(store.as_ref(), gap, date, &config, &market).await;
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
                Ok(candidate) => passed.push(candidate),
                Err(reason) => {
                    debug!(symbol = %symbol, reason = %reason, "Symbol dropped at liquidity filter");
                    skipped.push(SkippedSymbol::new(symbol, reason));
                }
            }
        }

        passed.sort_by(|a, b| {
            b.avg_volume
                .partial_cmp(&a.avg_volume)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let report = StageReport::new(FilterStage::Liquidity, input, passed.len(), skipped);
        (passed, report)
    }

    // ========================================================================
    // Stage 4: News Tagging
    // ========================================================================

    /// Attach news events; annotation only, never filters.
    fn news_tagging(
        &self,
        date: NaiveDate,
        mut candidates: Vec<Candidate>,
    ) -> (Vec<Candidate>, StageReport) {
        let input = candidates.len();
        let mut tagged = 0;

        for candidate in &mut candidates {
            candidate.news = self.news.news_for(candidate.symbol(), date);
            if candidate.news.is_some() {
                tagged += 1;
            }
        }

        info!(tagged, "News tagging complete");
        let report = StageReport::new(FilterStage::News, input, input, Vec::new());
        (candidates, report)
    }

    // ========================================================================
    // Stage 5: Composite Scoring
    // ========================================================================

    fn score_and_select(&self, mut candidates: Vec<Candidate>) -> (Vec<Candidate>, StageReport) {
        let input = candidates.len();

        for candidate in &mut candidates {
            candidate.score = score_candidate(candidate);
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let skipped = candidates
            .iter()
            .skip(self.config.max_candidates)
            .map(|c| SkippedSymbol::new(c.symbol(), "below top-K cutoff"))
            .collect();
        candidates.truncate(self.config.max_candidates);

        let report = StageReport::new(FilterStage::Scoring, input, candidates.len(), skipped);
        (candidates, report)
    }
}

// ============================================================================
// Per-Symbol Checks
// ============================================================================

async fn check_gap<D: MarketData + ?Sized>(
    store: &D,
    symbol: &str,
    date: NaiveDate,
    config: &PreMarketConfig,
    market: &MarketConfig,
    index_trend: Trend,
) -> Result<GapCandidate, String> {
    let prev_close = store
        .previous_close(symbol, date)
        .await
        .map_err(|e| format!("previous close unavailable: {}", e))?
        .ok_or("no previous close")?;

    let bars = store
        .minute_bars(symbol, date, market.open_time, market.gap_window_end)
        .await
        .map_err(|e| format!("minute data unavailable: {}", e))?;
    let first = bars.first().ok_or("no bars in opening window")?;

    let price = first.close;
    let gap_pct = ((price - prev_close) / prev_close) * 100.0;

    if gap_pct.abs() < config.gap_min_pct || gap_pct.abs() > config.gap_max_pct {
        return Err(format!("gap {:.2}% out of range", gap_pct));
    }

    let direction = if gap_pct > 0.0 {
        GapDirection::Up
    } else {
        GapDirection::Down
    };
    let aligned_with_index = matches!(
        (index_trend, direction),
        (Trend::Uptrend, GapDirection::Up) | (Trend::Downtrend, GapDirection::Down)
    );

    Ok(GapCandidate {
        symbol: symbol.to_string(),
        price,
        prev_close,
        gap_pct,
        direction,
        aligned_with_index,
    })
}

async fn check_liquidity<D: MarketData + ?Sized>(
    store: &D,
    gap: GapCandidate,
    date: NaiveDate,
    config: &PreMarketConfig,
    market: &MarketConfig,
) -> Result<Candidate, String> {
    let daily = store
        .daily_bars(&gap.symbol, config.volume_lookback_days)
        .await
        .map_err(|e| format!("daily data unavailable: {}", e))?;
    if daily.is_empty() {
        return Err("no daily data".to_string());
    }

    let avg_volume = daily.iter().map(|c| c.volume).sum::<f64>() / daily.len() as f64;
    if avg_volume < config.min_avg_volume {
        return Err(format!("average volume {:.0} below floor", avg_volume));
    }

    let early_bars = store
        .minute_bars(&gap.symbol, date, market.open_time, market.early_volume_end)
        .await
        .map_err(|e| format!("minute data unavailable: {}", e))?;
    let early_volume: f64 = early_bars.iter().map(|c| c.volume).sum();

    // Per-bucket share of the daily average expected in the early window
    let expected = avg_volume / config.intraday_buckets as f64;
    let early_volume_ratio = if expected > 0.0 {
        early_volume / expected
    } else {
        0.0
    };

    // Escape hatch: very liquid names pass without an early surge
    let surge = early_volume_ratio >= config.min_early_volume_ratio;
    let very_liquid = avg_volume > config.min_avg_volume * 2.0;
    if !surge && !very_liquid {
        return Err(format!(
            "early volume ratio {:.2} below {:.2}",
            early_volume_ratio, config.min_early_volume_ratio
        ));
    }

    Ok(Candidate {
        gap,
        avg_volume,
        early_volume,
        early_volume_ratio,
        news: None,
        score: 0.0,
    })
}

// ============================================================================
// Composite Scoring
// ============================================================================

/// Composite candidate score (0-100).
///
/// Gap size up to 30, index alignment 25, liquidity tier up to 25, news up
/// to 20.
fn score_candidate(candidate: &Candidate) -> f64 {
    let mut score = (candidate.gap.gap_pct.abs() / 2.0 * 30.0).min(30.0);

    if candidate.gap.aligned_with_index {
        score += 25.0;
    }

    score += if candidate.avg_volume > 10_000_000.0 {
        25.0
    } else if candidate.avg_volume > 5_000_000.0 {
        20.0
    } else if candidate.avg_volume > 1_000_000.0 {
        15.0
    } else if candidate.avg_volume > 500_000.0 {
        10.0
    } else {
        5.0
    };

    if let Some(news) = &candidate.news {
        score += if news.is_earnings() { 20.0 } else { 10.0 };
    }

    round2(score)
}

// ============================================================================
// Tests
// ============================================================================
