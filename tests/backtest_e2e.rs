//! Backtest engine tests over CSV fixtures.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;

use intraday_screener::backtest::{AlwaysStop, AlwaysTarget, BacktestEngine, MonteCarloExit};
use intraday_screener::config::AppConfig;
use intraday_screener::data::{CsvStore, NoNews};

use common::{append_minute_csv, full_setup_session, write_daily_csv, write_minute_csv};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
}

fn config_for(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.universe.stocks = vec!["ALPHA.NS".to_string()];
    config.universe.indices = vec!["^NSEI".to_string()];
    config.data.minute_dir = dir.to_path_buf();
    config.data.daily_dir = dir.to_path_buf();
    config
}

fn engine_for(dir: &std::path::Path) -> BacktestEngine<CsvStore> {
    let store = Arc::new(CsvStore::new(dir, dir));
    BacktestEngine::new(config_for(dir), store, Arc::new(NoNews))
}

#[tokio::test]
async fn empty_day_then_trading_day() {
    let dir = tempfile::tempdir().unwrap();
    // Minute data exists for Tuesday only; Monday produces an empty
    // record and the loop continues.
    write_daily_csv(dir.path(), "ALPHA.NS", tuesday(), 20, 1000.0, 2_000_000.0);
    write_minute_csv(dir.path(), "ALPHA.NS", tuesday(), &full_setup_session());
    write_daily_csv(dir.path(), "^NSEI", tuesday(), 60, 21_000.0, 0.0);

    let result = engine_for(dir.path())
        .run(monday(), tuesday(), 100_000.0, &mut AlwaysTarget)
        .await
        .unwrap();

    assert_eq!(result.days.len(), 2);

    let day1 = &result.days[0];
    assert_eq!(day1.date, monday());
    assert_eq!(day1.signals, 0);
    assert_eq!(day1.trades, 0);
    assert!((day1.pnl - 0.0).abs() < 1e-9);

    let day2 = &result.days[1];
    assert_eq!(day2.trades, 1);
    assert!(day2.pnl > 0.0);

    assert_eq!(result.metrics.trading_days, 1);
    assert_eq!(result.summary.winning_trades, 1);
    assert!(result.summary.current_capital > 100_000.0);
    assert_eq!(result.trades.len(), 1);
}

#[tokio::test]
async fn stop_exits_lose_and_hit_the_breaker() {
    let dir = tempfile::tempdir().unwrap();
    write_daily_csv(dir.path(), "ALPHA.NS", monday(), 20, 1000.0, 2_000_000.0);
    write_minute_csv(dir.path(), "ALPHA.NS", monday(), &full_setup_session());
    append_minute_csv(dir.path(), "ALPHA.NS", tuesday(), &full_setup_session());
    let wednesday = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
    append_minute_csv(dir.path(), "ALPHA.NS", wednesday, &full_setup_session());
    write_daily_csv(dir.path(), "^NSEI", monday(), 60, 21_000.0, 0.0);

    let result = engine_for(dir.path())
        .run(monday(), wednesday, 100_000.0, &mut AlwaysStop)
        .await
        .unwrap();

    // Two consecutive losses trip the breaker; Wednesday admits nothing
    // because the streak carries across the daily reset.
    assert_eq!(result.metrics.total_trades, 2);
    assert_eq!(result.summary.losing_trades, 2);
    assert_eq!(result.summary.consecutive_losses, 2);
    assert!(result.summary.total_pnl < 0.0);
    assert!(result.metrics.max_drawdown > 0.0);
}

#[tokio::test]
async fn seeded_monte_carlo_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    write_daily_csv(dir.path(), "ALPHA.NS", monday(), 20, 1000.0, 2_000_000.0);
    write_minute_csv(dir.path(), "ALPHA.NS", monday(), &full_setup_session());
    write_daily_csv(dir.path(), "^NSEI", monday(), 60, 21_000.0, 0.0);

    let run = |seed| {
        let engine = engine_for(dir.path());
        async move {
            let mut exit = MonteCarloExit::with_seed(0.6, seed);
            engine
                .run(monday(), monday(), 100_000.0, &mut exit)
                .await
                .unwrap()
        }
    };

    let a = run(42).await;
    let b = run(42).await;
    assert!((a.summary.total_pnl - b.summary.total_pnl).abs() < 1e-9);
    assert_eq!(a.metrics.total_trades, b.metrics.total_trades);
}

#[tokio::test]
async fn weekend_range_produces_no_days() {
    let dir = tempfile::tempdir().unwrap();
    let saturday = NaiveDate::from_ymd_opt(2024, 1, 13).unwrap();
    let sunday = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();

    let result = engine_for(dir.path())
        .run(saturday, sunday, 100_000.0, &mut AlwaysTarget)
        .await
        .unwrap();

    assert!(result.days.is_empty());
    assert_eq!(result.metrics.total_days, 0);
    assert!((result.metrics.sharpe_ratio - 0.0).abs() < 1e-9);
}
