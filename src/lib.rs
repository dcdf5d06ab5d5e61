//! Intraday equity screener library.
//!
//! A rule-based candidate funnel over a fixed large-cap NSE universe:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                      intraday-screener                             │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  pre-market screener  ─▶  live-market filter  ─▶  signal generator │
//! │   gap / liquidity /        trend / volume /        reversal candle │
//! │   news / score             location / rank         + entry rules   │
//! │                                                        │           │
//! │                        risk manager  ◀─────────────────┘           │
//! │                 sizing · trade ledger · limits                     │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The backtest engine replays the same funnel day by day with a
//! pluggable exit model. The HTTP layer in [`routes`] is the only command
//! surface; all domain logic lives in the component modules.

#![warn(clippy::all)]

pub mod backtest;
pub mod config;
pub mod data;
pub mod indicators;
pub mod rank;
pub mod report;
pub mod risk;
pub mod routes;
pub mod screener;
pub mod signal;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::AppConfig;
use crate::data::{CsvNews, CsvStore, NewsSource, NoNews};
use crate::report::ReportWriter;

/// Screener service state shared by all handlers.
pub struct AppState {
    /// Validated configuration
    pub config: AppConfig,
    /// CSV-backed market data store
    pub store: Arc<CsvStore>,
    /// News collaborator (CSV file or the null source)
    pub news: Arc<dyn NewsSource>,
    /// JSON report writer
    pub reports: ReportWriter,
}

impl AppState {
    /// Build the shared state from a validated configuration.
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = Arc::new(CsvStore::new(
            config.data.minute_dir.clone(),
            config.data.daily_dir.clone(),
        ));

        let news: Arc<dyn NewsSource> = match &config.data.news_file {
            Some(path) => Arc::new(
                CsvNews::load(path)
                    .with_context(|| format!("Failed to load news file {}", path.display()))?,
            ),
            None => Arc::new(NoNews),
        };

        let reports = ReportWriter::new(config.output.report_dir.clone());

        Ok(Self {
            config,
            store,
            news,
            reports,
        })
    }
}

/// The screener HTTP service.
pub struct ScreenerService {
    state: Arc<AppState>,
}

impl ScreenerService {
    /// Create a service from a validated configuration.
    pub fn new(config: AppConfig) -> Result<Self> {
        Ok(Self {
            state: Arc::new(AppState::new(config)?),
        })
    }

    /// Build the HTTP router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/api/v1/screen", get(routes::screen))
            .route("/api/v1/backtest", get(routes::backtest))
            .route("/api/v1/validate", get(routes::validate))
            .layer(
                ServiceBuilder::new()
                    .layer(RequestBodyLimitLayer::new(64 * 1024))
                    // Backtests over long ranges are the slowest request
                    .layer(TimeoutLayer::new(Duration::from_secs(300))),
            )
            .with_state(self.state.clone())
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.state.config.server.host, self.state.config.server.port
        )
        .parse()
        .context("Invalid server address")?;

        let app = self.router();
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
