//! End-to-end funnel tests over CSV fixtures.
//!
//! Drives the real CSV store through pre-market screening, live-market
//! filtering, signal generation and sizing, the same composition the
//! service handlers use.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;

use intraday_screener::config::AppConfig;
use intraday_screener::data::{CsvNews, CsvStore, NoNews};
use intraday_screener::risk::PositionSizer;
use intraday_screener::screener::{FilterStage, IntradayTrend, LiveMarketFilter, PreMarketScreener};
use intraday_screener::signal::{Side, SignalGenerator};

use common::{full_setup_session, wide_gap_session, write_daily_csv, write_minute_csv};

fn trade_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
}

/// Fixture: one symbol that survives the funnel, one rejected at the gap
/// stage, one with no data at all, plus the primary index.
fn build_fixture(dir: &std::path::Path) {
    write_daily_csv(dir, "ALPHA.NS", trade_date(), 20, 1000.0, 2_000_000.0);
    write_minute_csv(dir, "ALPHA.NS", trade_date(), &full_setup_session());

    write_daily_csv(dir, "WIDE.NS", trade_date(), 20, 1000.0, 2_000_000.0);
    write_minute_csv(dir, "WIDE.NS", trade_date(), &wide_gap_session());

    write_daily_csv(dir, "^NSEI", trade_date(), 60, 21_000.0, 0.0);
}

fn config_for(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.universe.stocks = vec![
        "ALPHA.NS".to_string(),
        "WIDE.NS".to_string(),
        "GHOST.NS".to_string(),
    ];
    config.universe.indices = vec!["^NSEI".to_string()];
    config.data.minute_dir = dir.to_path_buf();
    config.data.daily_dir = dir.to_path_buf();
    config
}

#[tokio::test]
async fn funnel_produces_sized_buy_order() {
    let dir = tempfile::tempdir().unwrap();
    build_fixture(dir.path());

    let config = config_for(dir.path());
    let store = Arc::new(CsvStore::new(dir.path(), dir.path()));

    // Pre-market: only ALPHA survives
    let screener = PreMarketScreener::new(
        config.pre_market.clone(),
        config.market,
        config.universe.stocks.clone(),
        config.universe.indices.clone(),
        Arc::clone(&store),
        Arc::new(NoNews),
    );
    let pre = screener.run(trade_date()).await.unwrap();

    assert_eq!(pre.candidates.len(), 1);
    let candidate = &pre.candidates[0];
    assert_eq!(candidate.symbol(), "ALPHA.NS");
    let gap = candidate.gap.gap_pct.abs();
    assert!((0.3..=2.0).contains(&gap));

    let gap_stage = pre
        .stages
        .iter()
        .find(|s| s.stage == FilterStage::Gap)
        .unwrap();
    assert!(gap_stage
        .skipped
        .iter()
        .any(|s| s.symbol == "WIDE.NS" && s.reason.contains("out of range")));
    assert!(gap_stage.skipped.iter().any(|s| s.symbol == "GHOST.NS"));

    // Live market: ALPHA classifies bullish
    let filter = LiveMarketFilter::new(config.live_market.clone(), config.market, Arc::clone(&store));
    let live = filter.run(pre.candidates, trade_date()).await.unwrap();

    assert_eq!(live.candidates.len(), 1);
    assert_eq!(live.candidates[0].trend, IntradayTrend::Bullish);
    assert!(live.candidates[0].volume_ratio > 1.2);

    // Signals: a BUY with stop and target on the correct sides
    let generator = SignalGenerator::new(
        config.signal.clone(),
        config.live_market.clone(),
        config.risk.clone(),
    );
    let signals = generator.generate(&live.candidates);

    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.side, Side::Buy);
    assert!(signal.stop_loss < signal.entry);
    assert!(signal.entry < signal.target);
    assert!(signal.score > 0.0 && signal.score <= 100.0);

    // Sizing: the 20%-of-capital cap holds
    let sizer = PositionSizer::new(config.risk.clone());
    let position = sizer.validate(signal, 100_000.0).unwrap();
    assert!(position.quantity > 0);
    assert!(position.quantity as f64 * signal.entry <= 20_000.0 + 1e-6);
}

#[tokio::test]
async fn news_tagging_raises_score() {
    let dir = tempfile::tempdir().unwrap();
    build_fixture(dir.path());

    let news_path = dir.path().join("news.csv");
    std::fs::write(
        &news_path,
        format!(
            "date,symbol,event_type,description\n{},ALPHA.NS,earnings,Q3 results\n",
            trade_date().format("%Y-%m-%d")
        ),
    )
    .unwrap();

    let config = config_for(dir.path());
    let store = Arc::new(CsvStore::new(dir.path(), dir.path()));

    let run_with = |news: Arc<dyn intraday_screener::data::NewsSource>| {
        let screener = PreMarketScreener::new(
            config.pre_market.clone(),
            config.market,
            config.universe.stocks.clone(),
            config.universe.indices.clone(),
            Arc::clone(&store),
            news,
        );
        async move { screener.run(trade_date()).await.unwrap() }
    };

    let without_news = run_with(Arc::new(NoNews)).await;
    let with_news = run_with(Arc::new(CsvNews::load(&news_path).unwrap())).await;

    let plain = &without_news.candidates[0];
    let tagged = &with_news.candidates[0];
    assert!(plain.news.is_none());
    assert_eq!(tagged.news.as_ref().unwrap().event_type, "earnings");
    assert!((tagged.score - plain.score - 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn sideways_index_disables_alignment_bonus() {
    let dir = tempfile::tempdir().unwrap();
    build_fixture(dir.path());

    let config = config_for(dir.path());
    let store = Arc::new(CsvStore::new(dir.path(), dir.path()));
    let screener = PreMarketScreener::new(
        config.pre_market.clone(),
        config.market,
        config.universe.stocks.clone(),
        config.universe.indices.clone(),
        store,
        Arc::new(NoNews),
    );

    let outcome = screener.run(trade_date()).await.unwrap();

    // Flat index closes classify sideways: no gap can align with it
    assert_eq!(
        outcome.index_context[0].trend,
        intraday_screener::indicators::Trend::Sideways
    );
    assert!(!outcome.candidates[0].gap.aligned_with_index);
}
