//! Day-by-day backtest engine.
//!
//! Re-runs the exact funnel the live path uses — pre-market screening,
//! live filtering, signal generation, sizing — once per trading day,
//! replacing real-time exit observation with the injected exit model. A
//! failed day is logged and recorded as empty; the loop always continues.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::data::{MarketData, NewsSource};
use crate::risk::{PositionSizer, RiskManager, Trade, TradeSummary};
use crate::screener::{LiveMarketFilter, PreMarketScreener};
use crate::signal::SignalGenerator;

use super::exit::ExitModel;
use super::metrics::{BacktestMetrics, DayRecord};

// ============================================================================
// Backtest Result
// ============================================================================

/// Complete result of a backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    /// First calendar day of the range
    pub start: NaiveDate,
    /// Last calendar day of the range
    pub end: NaiveDate,
    /// Starting capital
    pub initial_capital: f64,
    /// Per-day records (weekdays only)
    pub days: Vec<DayRecord>,
    /// Aggregate metrics
    pub metrics: BacktestMetrics,
    /// Ledger summary over closed trades
    pub summary: TradeSummary,
    /// All closed trades
    pub trades: Vec<Trade>,
}

// ============================================================================
// Backtest Engine
// ============================================================================

/// Composition root for the backtest path.
pub struct BacktestEngine<D: MarketData> {
    screener: PreMarketScreener<D>,
    filter: LiveMarketFilter<D>,
    signals: SignalGenerator,
    sizer: PositionSizer,
    config: AppConfig,
}

impl<D: MarketData> BacktestEngine<D> {
    /// Wire the funnel components from one config and shared collaborators.
    pub fn new(config: AppConfig, store: Arc<D>, news: Arc<dyn NewsSource>) -> Self {
        let screener = PreMarketScreener::new(
            config.pre_market.clone(),
            config.market,
            config.universe.stocks.clone(),
            config.universe.indices.clone(),
            Arc::clone(&store),
            news,
        );
        let filter = LiveMarketFilter::new(config.live_market.clone(), config.market, store);
        let signals = SignalGenerator::new(
            config.signal.clone(),
            config.live_market.clone(),
            config.risk.clone(),
        );
        let sizer = PositionSizer::new(config.risk.clone());

        Self {
            screener,
            filter,
            signals,
            sizer,
            config,
        }
    }

    /// Run the backtest over `[start, end]`, skipping weekends.
    pub async fn run(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        initial_capital: f64,
        exit: &mut dyn ExitModel,
    ) -> Result<BacktestResult> {
        info!(%start, %end, initial_capital, "Running backtest");

        let mut risk = RiskManager::new(initial_capital, self.config.risk.clone());
        let mut days = Vec::new();

        let mut date = start;
        while date <= end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                risk.reset_daily_counters();

                let record = match self.run_day(date, &mut risk, exit).await {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(%date, error = %e, "Backtest day failed, recording empty day");
                        DayRecord::empty(date)
                    }
                };
                days.push(record);
            }

            date = date.succ_opt().context("date overflow")?;
        }

        let metrics = BacktestMetrics::from_days(&days);
        let summary = risk.summary();
        let trades: Vec<Trade> = risk.closed_trades().into_iter().cloned().collect();

        info!(
            total_days = metrics.total_days,
            total_trades = metrics.total_trades,
            win_rate = summary.win_rate,
            total_pnl = summary.total_pnl,
            max_drawdown = metrics.max_drawdown,
            sharpe = metrics.sharpe_ratio,
            "Backtest complete"
        );

        Ok(BacktestResult {
            start,
            end,
            initial_capital,
            days,
            metrics,
            summary,
            trades,
        })
    }

    /// Run the funnel for one trading day and resolve admitted trades.
    async fn run_day(
        &self,
        date: NaiveDate,
        risk: &mut RiskManager,
        exit: &mut dyn ExitModel,
    ) -> Result<DayRecord> {
        info!(%date, "Backtesting day");

        let pre = self.screener.run(date).await?;
        if pre.candidates.is_empty() {
            return Ok(DayRecord::empty(date));
        }
        let pre_count = pre.candidates.len();

        let live = self.filter.run(pre.candidates, date).await?;
        if live.candidates.is_empty() {
            return Ok(DayRecord {
                pre_market_candidates: pre_count,
                ..DayRecord::empty(date)
            });
        }
        let live_count = live.candidates.len();

        let signals = self.signals.generate(&live.candidates);

        let entry_time = date.and_time(self.config.market.open_time);
        let exit_time = date.and_time(self.config.market.close_time);
        let mut day_pnl = 0.0;
        let mut trades_taken = 0;

        // Admit signals best-first until a risk limit trips; a sizing
        // rejection only skips that signal.
        for signal in &signals {
            if let Err(block) = risk.can_take_trade() {
                info!(%date, %block, "Trade admission halted");
                break;
            }

            let position = match self.sizer.validate(signal, risk.capital()) {
                Ok(position) => position,
                Err(reason) => {
                    warn!(symbol = %signal.symbol, %reason, "Signal rejected by sizing");
                    continue;
                }
            };

            let id = risk.add_trade(signal, &position, entry_time);
            let exit_price = exit.resolve(signal);
            let closed = risk.close_trade(id, exit_price, exit_time)?;

            day_pnl += closed.pnl;
            trades_taken += 1;
        }

        Ok(DayRecord {
            date,
            pre_market_candidates: pre_count,
            live_candidates: live_count,
            signals: signals.len(),
            trades: trades_taken,
            pnl: day_pnl,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::exit::{AlwaysStop, AlwaysTarget};
    use crate::data::{Candle, NoNews};
    use crate::screener::testutil::{daily_bar, minute_bar, MockStore};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
    }

    /// Full bullish session for `date`: 1% opening gap over a 1000 close,
    /// steady rise, hammer close with a volume surge.
    fn full_setup_session(date: NaiveDate) -> Vec<Candle> {
        let n = 250;
        let mut bars = vec![minute_bar(date, 9, 15, 1008.0, 1011.0, 1007.0, 1010.0, 60_000.0)];
        for i in 1..n - 1 {
            let minute = i as u32;
            let (h, m) = (9 + (15 + minute) / 60, (15 + minute) % 60);
            let base = 1010.0 + i as f64 * 0.4;
            bars.push(minute_bar(date, h, m, base, base + 1.0, base - 1.0, base + 0.4, 10_000.0));
        }
        let minute = (n - 1) as u32;
        let (h, m) = (9 + (15 + minute) / 60, (15 + minute) % 60);
        let open = 1010.0 + (n - 1) as f64 * 0.4;
        bars.push(minute_bar(date, h, m, open, open + 1.3, open - 3.0, open + 1.0, 30_000.0));
        bars
    }

    fn store_for(symbol: &str, trade_date: NaiveDate) -> MockStore {
        let daily: Vec<Candle> = (0..20)
            .map(|i| daily_bar(trade_date - chrono::Duration::days(20 - i), 1000.0, 2_000_000.0))
            .collect();
        MockStore::default()
            .with_daily(symbol, daily)
            .with_minute(symbol, full_setup_session(trade_date))
    }

    fn engine(store: MockStore, symbols: Vec<&str>) -> BacktestEngine<MockStore> {
        let mut config = AppConfig::default();
        config.universe.stocks = symbols.into_iter().map(String::from).collect();
        config.universe.indices = vec!["^NSEI".to_string()];
        BacktestEngine::new(config, Arc::new(store), Arc::new(NoNews))
    }

    #[tokio::test]
    async fn test_empty_day_then_trading_day() {
        // Minute data exists only for Tuesday; Monday yields an empty
        // record and the loop proceeds.
        let store = store_for("A.NS", tuesday());
        let engine = engine(store, vec!["A.NS"]);

        let result = engine
            .run(monday(), tuesday(), 100_000.0, &mut AlwaysTarget)
            .await
            .unwrap();

        assert_eq!(result.days.len(), 2);
        let day1 = &result.days[0];
        assert_eq!(day1.signals, 0);
        assert_eq!(day1.trades, 0);
        assert!((day1.pnl - 0.0).abs() < 1e-9);

        let day2 = &result.days[1];
        assert_eq!(day2.trades, 1);
        assert!(day2.pnl > 0.0);
        assert_eq!(result.summary.winning_trades, 1);
        assert!(result.summary.current_capital > 100_000.0);
    }

    #[tokio::test]
    async fn test_weekends_skipped() {
        let saturday = NaiveDate::from_ymd_opt(2024, 1, 13).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        let store = MockStore::default();
        let engine = engine(store, vec!["A.NS"]);

        let result = engine
            .run(saturday, sunday, 100_000.0, &mut AlwaysTarget)
            .await
            .unwrap();

        assert!(result.days.is_empty());
        assert_eq!(result.metrics.total_days, 0);
    }

    #[tokio::test]
    async fn test_losses_trip_breaker_across_days() {
        // Every day produces a losing trade; after 2 consecutive losses
        // the breaker blocks all further admissions (it survives the
        // daily reset), so total trades stay at 2.
        let mut store = MockStore::default();
        let dates = [
            monday(),
            tuesday(),
            NaiveDate::from_ymd_opt(2024, 1, 17).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 18).unwrap(),
        ];
        let daily: Vec<Candle> = (0..20)
            .map(|i| daily_bar(monday() - chrono::Duration::days(20 - i), 1000.0, 2_000_000.0))
            .collect();
        store.daily.insert("A.NS".to_string(), daily);
        let mut minutes = Vec::new();
        for date in dates {
            minutes.extend(full_setup_session(date));
        }
        store.minute.insert("A.NS".to_string(), minutes);

        let engine = engine(store, vec!["A.NS"]);
        let result = engine
            .run(monday(), dates[3], 100_000.0, &mut AlwaysStop)
            .await
            .unwrap();

        assert_eq!(result.metrics.total_trades, 2);
        assert_eq!(result.summary.losing_trades, 2);
        assert_eq!(result.summary.consecutive_losses, 2);
    }

    #[tokio::test]
    async fn test_metrics_present() {
        let store = store_for("A.NS", monday());
        let engine = engine(store, vec!["A.NS"]);

        let result = engine
            .run(monday(), tuesday(), 100_000.0, &mut AlwaysTarget)
            .await
            .unwrap();

        assert_eq!(result.metrics.total_days, 2);
        assert_eq!(result.metrics.trading_days, 1);
        assert!(result.metrics.max_drawdown >= 0.0);
        assert_eq!(result.trades.len(), result.metrics.total_trades);
    }
}
