//! Candidate funnel screening stages.
//!
//! The funnel narrows the fixed universe in two passes:
//!
//! ```text
//! universe (~50)
//!    │  pre-market (gap → liquidity → news → score)      ≤ 8 candidates
//!    ▼
//! live market (trend → volume/range → location → rank)   ≤ 4 candidates
//! ```
//!
//! Each stage consumes only the survivors of the previous stage and
//! records the symbols it dropped with their reasons. A per-symbol data
//! failure skips that symbol, never the batch.

mod live_market;
mod pre_market;
mod stage;

pub use live_market::{
    IntradayTrend, KeyLevel, KeyLevelKind, LiveCandidate, LiveMarketFilter, LiveOutcome,
};
pub use pre_market::{
    Candidate, GapCandidate, GapDirection, IndexContext, PreMarketOutcome, PreMarketScreener,
};
pub use stage::{FilterStage, SkippedSymbol, StageReport};

// ============================================================================
// Test Support
// ============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use crate::data::{Candle, DataError, MarketData};

    /// In-memory market data store for unit tests.
    #[derive(Default)]
    pub struct MockStore {
        pub minute: HashMap<String, Vec<Candle>>,
        pub daily: HashMap<String, Vec<Candle>>,
    }

    impl MockStore {
        pub fn with_minute(mut self, symbol: &str, bars: Vec<Candle>) -> Self {
            self.minute.insert(symbol.to_string(), bars);
            self
        }

        pub fn with_daily(mut self, symbol: &str, bars: Vec<Candle>) -> Self {
            self.daily.insert(symbol.to_string(), bars);
            self
        }
    }

    #[async_trait]
    impl MarketData for MockStore {
        async fn minute_bars(
            &self,
            symbol: &str,
            date: NaiveDate,
            from: NaiveTime,
            to: NaiveTime,
        ) -> Result<Vec<Candle>, DataError> {
            let bars = self.minute.get(symbol).cloned().unwrap_or_default();
            Ok(bars
                .into_iter()
                .filter(|c| {
                    c.timestamp.date() == date
                        && c.timestamp.time() >= from
                        && c.timestamp.time() <= to
                })
                .collect())
        }

        async fn daily_bars(
            &self,
            symbol: &str,
            lookback_days: usize,
        ) -> Result<Vec<Candle>, DataError> {
            let mut bars = self.daily.get(symbol).cloned().unwrap_or_default();
            if bars.len() > lookback_days {
                bars.drain(..bars.len() - lookback_days);
            }
            Ok(bars)
        }

        async fn previous_close(
            &self,
            symbol: &str,
            date: NaiveDate,
        ) -> Result<Option<f64>, DataError> {
            let bars = self.daily.get(symbol).cloned().unwrap_or_default();
            Ok(bars
                .iter()
                .rev()
                .find(|c| c.timestamp.date() < date)
                .map(|c| c.close))
        }
    }

    pub fn ts(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    pub fn minute_bar(
        date: NaiveDate,
        h: u32,
        m: u32,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Candle {
        Candle {
            timestamp: ts(date, h, m),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn daily_bar(date: NaiveDate, close: f64, volume: f64) -> Candle {
        Candle {
            timestamp: ts(date, 0, 0),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume,
        }
    }
}
