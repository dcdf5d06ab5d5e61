//! HTTP routes for the screener service.
//!
//! Thin handlers only: parse parameters, run the funnel components, emit
//! the structured result (and a JSON report file when configured).

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::data::{DataValidator, MarketData, ValidationReport};
use crate::risk::{Position, PositionSizer, RiskManager};
use crate::screener::{LiveMarketFilter, LiveOutcome, PreMarketOutcome, PreMarketScreener};
use crate::signal::{Signal, SignalGenerator};
use crate::backtest::{BacktestEngine, BacktestResult, MonteCarloExit};
use crate::AppState;

// ============================================================================
// Error Handling
// ============================================================================

/// Handler-level error with an HTTP status.
pub enum ApiError {
    /// Caller mistake (bad parameters)
    BadRequest(String),
    /// Anything that failed server-side
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(err) => {
                error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "intraday-screener".to_string(),
    })
}

// ============================================================================
// Screening
// ============================================================================

/// Screening depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenMode {
    /// Stop after pre-market screening
    Premarket,
    /// Full funnel: pre-market → live filter → signals → sizing
    Full,
}

#[derive(Debug, Deserialize)]
pub struct ScreenParams {
    /// Trading date (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Screening depth, defaults to full
    pub mode: Option<ScreenMode>,
    /// Capital used for sizing, defaults to the configured backtest capital
    pub capital: Option<f64>,
}

/// A signal with its computed position size.
#[derive(Debug, Serialize)]
pub struct SizedOrder {
    pub signal: Signal,
    pub position: Position,
}

#[derive(Debug, Serialize)]
pub struct ScreenResponse {
    pub date: NaiveDate,
    pub mode: ScreenMode,
    pub pre_market: PreMarketOutcome,
    pub live: Option<LiveOutcome>,
    pub signals: Vec<Signal>,
    pub orders: Vec<SizedOrder>,
    /// Set when trade admission halted before all signals were sized
    pub admission_halted: Option<String>,
    pub report_path: Option<PathBuf>,
}

/// Run the funnel for one date.
pub async fn screen(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScreenParams>,
) -> Result<Json<ScreenResponse>, ApiError> {
    let mode = params.mode.unwrap_or(ScreenMode::Full);
    let config = &state.config;

    let screener = PreMarketScreener::new(
        config.pre_market.clone(),
        config.market,
        config.universe.stocks.clone(),
        config.universe.indices.clone(),
        Arc::clone(&state.store),
        Arc::clone(&state.news),
    );
    let pre_market = screener.run(params.date).await?;

    if mode == ScreenMode::Premarket {
        let mut response = ScreenResponse {
            date: params.date,
            mode,
            pre_market,
            live: None,
            signals: Vec::new(),
            orders: Vec::new(),
            admission_halted: None,
            report_path: None,
        };
        response.report_path = state.reports.write_best_effort("premarket", &response);
        return Ok(Json(response));
    }

    let filter = LiveMarketFilter::new(
        config.live_market.clone(),
        config.market,
        Arc::clone(&state.store),
    );
    let live = filter.run(pre_market.candidates.clone(), params.date).await?;

    let generator = SignalGenerator::new(
        config.signal.clone(),
        config.live_market.clone(),
        config.risk.clone(),
    );
    let signals = generator.generate(&live.candidates);

    // Size signals in score order under the session risk limits, exactly
    // as the backtest admits them.
    let capital = params.capital.unwrap_or(config.backtest.initial_capital);
    let mut risk = RiskManager::new(capital, config.risk.clone());
    let sizer = PositionSizer::new(config.risk.clone());
    let entry_time = params.date.and_time(config.market.open_time);

    let mut orders = Vec::new();
    let mut admission_halted = None;
    for signal in &signals {
        if let Err(block) = risk.can_take_trade() {
            admission_halted = Some(block.to_string());
            break;
        }
        match sizer.validate(signal, risk.capital()) {
            Ok(position) => {
                risk.add_trade(signal, &position, entry_time);
                orders.push(SizedOrder {
                    signal: signal.clone(),
                    position,
                });
            }
            Err(reason) => {
                tracing::warn!(symbol = %signal.symbol, %reason, "Signal rejected by sizing");
            }
        }
    }

    let mut response = ScreenResponse {
        date: params.date,
        mode,
        pre_market,
        live: Some(live),
        signals,
        orders,
        admission_halted,
        report_path: None,
    };
    response.report_path = state.reports.write_best_effort("screen", &response);
    Ok(Json(response))
}

// ============================================================================
// Backtest
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BacktestParams {
    /// Range start (YYYY-MM-DD)
    pub start: NaiveDate,
    /// Range end, inclusive (YYYY-MM-DD)
    pub end: NaiveDate,
    /// Starting capital, defaults to the configured value
    pub capital: Option<f64>,
    /// Optional RNG seed for a reproducible Monte-Carlo exit sequence
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct BacktestResponse {
    #[serde(flatten)]
    pub result: BacktestResult,
    pub report_path: Option<PathBuf>,
}

/// Run the backtest over a date range.
pub async fn backtest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BacktestParams>,
) -> Result<Json<BacktestResponse>, ApiError> {
    if params.start > params.end {
        return Err(ApiError::BadRequest(
            "start date must not be after end date".to_string(),
        ));
    }

    let config = state.config.clone();
    let capital = params.capital.unwrap_or(config.backtest.initial_capital);
    let win_probability = config.backtest.win_probability;

    let mut exit = match params.seed {
        Some(seed) => MonteCarloExit::with_seed(win_probability, seed),
        None => MonteCarloExit::new(win_probability),
    };

    let engine = BacktestEngine::new(config, Arc::clone(&state.store), Arc::clone(&state.news));
    let result = engine
        .run(params.start, params.end, capital, &mut exit)
        .await?;

    let report_path = state.reports.write_best_effort("backtest", &result);
    Ok(Json(BacktestResponse {
        result,
        report_path,
    }))
}

// ============================================================================
// Data Validation
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    /// Session date whose minute bars are checked; defaults to today
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub date: NaiveDate,
    pub symbols_checked: usize,
    pub symbols_valid: usize,
    pub reports: Vec<ValidationReport>,
}

/// Validate OHLCV integrity across the universe.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ValidateParams>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let market = state.config.market;
    let interval = Duration::minutes(market.bar_interval_minutes as i64);

    let mut reports = Vec::new();
    for symbol in &state.config.universe.stocks {
        let minute = state
            .store
            .minute_bars(symbol, date, market.open_time, market.close_time)
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;
        let daily = state
            .store
            .daily_bars(symbol, state.config.pre_market.index_lookback_days)
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;

        reports.push(DataValidator::report(symbol, &minute, &daily, interval));
    }

    let symbols_valid = reports.iter().filter(|r| r.is_valid()).count();
    Ok(Json(ValidateResponse {
        date,
        symbols_checked: reports.len(),
        symbols_valid,
        reports,
    }))
}
