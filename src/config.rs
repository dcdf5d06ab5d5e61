//! Application configuration.
//!
//! Every component receives its sub-config by value at construction; no
//! component reads ambient state. Loading fails fast on unparseable files
//! and `validate` rejects inconsistent values before the funnel starts.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Application Configuration
// ============================================================================

/// Top-level configuration, loaded once per session from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Symbol universe
    #[serde(default)]
    pub universe: UniverseConfig,
    /// Data directories
    #[serde(default)]
    pub data: DataConfig,
    /// Exchange session times
    #[serde(default)]
    pub market: MarketConfig,
    /// Pre-market screening thresholds
    #[serde(default)]
    pub pre_market: PreMarketConfig,
    /// Live-market filtering thresholds
    #[serde(default)]
    pub live_market: LiveMarketConfig,
    /// Signal generation thresholds
    #[serde(default)]
    pub signal: SignalConfig,
    /// Risk and position sizing rules
    #[serde(default)]
    pub risk: RiskConfig,
    /// Backtest parameters
    #[serde(default)]
    pub backtest: BacktestConfig,
    /// HTTP server binding
    #[serde(default)]
    pub server: ServerConfig,
    /// Result report output
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency.
    ///
    /// Misconfiguration is the only fatal error class in the system, so it
    /// must surface before any screening starts.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.universe.stocks.is_empty() {
            errors.push("universe.stocks must not be empty".to_string());
        }
        if self.universe.indices.is_empty() {
            errors.push("universe.indices must not be empty".to_string());
        }

        if self.pre_market.gap_min_pct <= 0.0 || self.pre_market.gap_max_pct <= 0.0 {
            errors.push("pre_market gap bounds must be positive".to_string());
        }
        if self.pre_market.gap_min_pct >= self.pre_market.gap_max_pct {
            errors.push("pre_market.gap_min_pct must be below gap_max_pct".to_string());
        }
        if self.pre_market.max_candidates == 0 {
            errors.push("pre_market.max_candidates must be at least 1".to_string());
        }
        if self.pre_market.intraday_buckets == 0 {
            errors.push("pre_market.intraday_buckets must be at least 1".to_string());
        }
        if self.pre_market.volume_lookback_days == 0 {
            errors.push("pre_market.volume_lookback_days must be at least 1".to_string());
        }
        if self.pre_market.index_ema_fast >= self.pre_market.index_ema_slow {
            errors.push("pre_market.index_ema_fast must be below index_ema_slow".to_string());
        }

        if self.live_market.ema_fast >= self.live_market.ema_slow {
            errors.push("live_market.ema_fast must be below ema_slow".to_string());
        }
        if self.live_market.max_candidates == 0 {
            errors.push("live_market.max_candidates must be at least 1".to_string());
        }
        if self.live_market.volume_lookback == 0 {
            errors.push("live_market.volume_lookback must be at least 1".to_string());
        }

        if self.signal.volume_lookback == 0 {
            errors.push("signal.volume_lookback must be at least 1".to_string());
        }

        if self.risk.risk_per_trade_pct <= 0.0 || self.risk.risk_per_trade_pct > 100.0 {
            errors.push("risk.risk_per_trade_pct must be in (0, 100]".to_string());
        }
        if self.risk.max_position_pct <= 0.0 || self.risk.max_position_pct > 100.0 {
            errors.push("risk.max_position_pct must be in (0, 100]".to_string());
        }
        if self.risk.capital_floor_pct < 0.0 || self.risk.capital_floor_pct >= 100.0 {
            errors.push("risk.capital_floor_pct must be in [0, 100)".to_string());
        }
        if self.risk.atr_period == 0 {
            errors.push("risk.atr_period must be at least 1".to_string());
        }
        if self.risk.stop_loss_atr_multiplier <= 0.0 {
            errors.push("risk.stop_loss_atr_multiplier must be positive".to_string());
        }
        if self.risk.reward_ratio <= 0.0 {
            errors.push("risk.reward_ratio must be positive".to_string());
        }

        if !(0.0..=1.0).contains(&self.backtest.win_probability) {
            errors.push("backtest.win_probability must be in [0, 1]".to_string());
        }

        if self.market.open_time >= self.market.close_time {
            errors.push("market.open_time must be before close_time".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!("Invalid configuration:\n  - {}", errors.join("\n  - "))
        }
    }
}

// ============================================================================
// Universe
// ============================================================================

/// Fixed symbol universe (stocks plus index symbols for trend context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Stock universe to screen
    #[serde(default = "default_stocks")]
    pub stocks: Vec<String>,
    /// Index symbols; the first entry is the primary index used for gap
    /// alignment
    #[serde(default = "default_indices")]
    pub indices: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            stocks: default_stocks(),
            indices: default_indices(),
        }
    }
}

/// The Nifty-50 constituents.
fn default_stocks() -> Vec<String> {
    [
        "RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "ICICIBANK.NS",
        "HINDUNILVR.NS", "ITC.NS", "SBIN.NS", "BHARTIARTL.NS", "KOTAKBANK.NS",
        "LT.NS", "AXISBANK.NS", "ASIANPAINT.NS", "MARUTI.NS", "BAJFINANCE.NS",
        "HCLTECH.NS", "WIPRO.NS", "ULTRACEMCO.NS", "ONGC.NS", "SUNPHARMA.NS",
        "TITAN.NS", "NESTLEIND.NS", "NTPC.NS", "TATAMOTORS.NS", "POWERGRID.NS",
        "M&M.NS", "BAJAJFINSV.NS", "TECHM.NS", "ADANIPORTS.NS", "DIVISLAB.NS",
        "TATASTEEL.NS", "COALINDIA.NS", "HINDALCO.NS", "JSWSTEEL.NS", "GRASIM.NS",
        "INDUSINDBK.NS", "DRREDDY.NS", "CIPLA.NS", "EICHERMOT.NS", "HEROMOTOCO.NS",
        "APOLLOHOSP.NS", "BRITANNIA.NS", "BPCL.NS", "TATACONSUM.NS", "SBILIFE.NS",
        "LTIM.NS", "ADANIENT.NS", "BAJAJ-AUTO.NS", "HDFCLIFE.NS", "SHRIRAMFIN.NS",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_indices() -> Vec<String> {
    vec!["^NSEI".to_string(), "^NSEBANK".to_string()]
}

// ============================================================================
// Data Directories
// ============================================================================

/// Locations of the CSV-backed market data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory with per-symbol minute CSV files
    #[serde(default = "default_minute_dir")]
    pub minute_dir: PathBuf,
    /// Directory with per-symbol daily CSV files
    #[serde(default = "default_daily_dir")]
    pub daily_dir: PathBuf,
    /// Optional news/events CSV file
    #[serde(default)]
    pub news_file: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            minute_dir: default_minute_dir(),
            daily_dir: default_daily_dir(),
            news_file: None,
        }
    }
}

fn default_minute_dir() -> PathBuf {
    PathBuf::from("data/minute")
}

fn default_daily_dir() -> PathBuf {
    PathBuf::from("data/daily")
}

// ============================================================================
// Market Session
// ============================================================================

/// NSE session times (exchange-local).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Session open
    #[serde(default = "default_open_time")]
    pub open_time: NaiveTime,
    /// Session close
    #[serde(default = "default_close_time")]
    pub close_time: NaiveTime,
    /// End of the opening window used for gap measurement
    #[serde(default = "default_gap_window_end")]
    pub gap_window_end: NaiveTime,
    /// End of the early window used for pre-open volume measurement
    #[serde(default = "default_early_volume_end")]
    pub early_volume_end: NaiveTime,
    /// Minute-bar interval of the intraday data
    #[serde(default = "default_bar_interval_minutes")]
    pub bar_interval_minutes: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            open_time: default_open_time(),
            close_time: default_close_time(),
            gap_window_end: default_gap_window_end(),
            early_volume_end: default_early_volume_end(),
            bar_interval_minutes: default_bar_interval_minutes(),
        }
    }
}

fn default_open_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 15, 0).unwrap()
}

fn default_close_time() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).unwrap()
}

fn default_gap_window_end() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap()
}

fn default_early_volume_end() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 35, 0).unwrap()
}

fn default_bar_interval_minutes() -> u32 {
    1
}

// ============================================================================
// Pre-Market Screening
// ============================================================================

/// Thresholds for the pre-market gap/liquidity funnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreMarketConfig {
    /// Minimum absolute gap (%)
    #[serde(default = "default_gap_min_pct")]
    pub gap_min_pct: f64,
    /// Maximum absolute gap (%)
    #[serde(default = "default_gap_max_pct")]
    pub gap_max_pct: f64,
    /// Days of history for the average-volume baseline
    #[serde(default = "default_volume_lookback_days")]
    pub volume_lookback_days: usize,
    /// Absolute floor on average daily volume (shares/day)
    #[serde(default = "default_min_avg_volume")]
    pub min_avg_volume: f64,
    /// Required early-volume ratio against the per-bucket expectation
    #[serde(default = "default_min_early_volume_ratio")]
    pub min_early_volume_ratio: f64,
    /// Number of volume buckets in a full session (used to pro-rate the
    /// daily average down to the early window)
    #[serde(default = "default_intraday_buckets")]
    pub intraday_buckets: usize,
    /// Maximum candidates passed to the live filter
    #[serde(default = "default_pre_market_candidates")]
    pub max_candidates: usize,
    /// Fast EMA period for index trend context (daily bars)
    #[serde(default = "default_index_ema_fast")]
    pub index_ema_fast: usize,
    /// Slow EMA period for index trend context (daily bars)
    #[serde(default = "default_index_ema_slow")]
    pub index_ema_slow: usize,
    /// Daily bars loaded for index trend context
    #[serde(default = "default_index_lookback_days")]
    pub index_lookback_days: usize,
}

impl Default for PreMarketConfig {
    fn default() -> Self {
        Self {
            gap_min_pct: default_gap_min_pct(),
            gap_max_pct: default_gap_max_pct(),
            volume_lookback_days: default_volume_lookback_days(),
            min_avg_volume: default_min_avg_volume(),
            min_early_volume_ratio: default_min_early_volume_ratio(),
            intraday_buckets: default_intraday_buckets(),
            max_candidates: default_pre_market_candidates(),
            index_ema_fast: default_index_ema_fast(),
            index_ema_slow: default_index_ema_slow(),
            index_lookback_days: default_index_lookback_days(),
        }
    }
}

fn default_gap_min_pct() -> f64 {
    0.3
}

fn default_gap_max_pct() -> f64 {
    2.0
}

fn default_volume_lookback_days() -> usize {
    20
}

fn default_min_avg_volume() -> f64 {
    100_000.0
}

fn default_min_early_volume_ratio() -> f64 {
    1.2
}

fn default_intraday_buckets() -> usize {
    75 // 375-minute NSE session in 5-minute buckets
}

fn default_pre_market_candidates() -> usize {
    8
}

fn default_index_ema_fast() -> usize {
    50
}

fn default_index_ema_slow() -> usize {
    200
}

fn default_index_lookback_days() -> usize {
    250
}

// ============================================================================
// Live-Market Filtering
// ============================================================================

/// Thresholds for the live-market trend/volume/location filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMarketConfig {
    /// Fast EMA period on intraday bars
    #[serde(default = "default_live_ema_fast")]
    pub ema_fast: usize,
    /// Slow EMA period on intraday bars; doubles as the minimum bar count
    /// required before a symbol is considered at all
    #[serde(default = "default_live_ema_slow")]
    pub ema_slow: usize,
    /// Bars in the volume-surge baseline
    #[serde(default = "default_live_volume_lookback")]
    pub volume_lookback: usize,
    /// Minimum latest-bar volume ratio against the baseline
    #[serde(default = "default_min_volume_ratio")]
    pub min_volume_ratio: f64,
    /// Minimum session range as % of price
    #[serde(default = "default_min_range_pct")]
    pub min_range_pct: f64,
    /// Bars in the opening range
    #[serde(default = "default_opening_range_bars")]
    pub opening_range_bars: usize,
    /// Key-level proximity threshold (%)
    #[serde(default = "default_proximity_pct")]
    pub proximity_pct: f64,
    /// Maximum candidates passed to signal generation
    #[serde(default = "default_live_candidates")]
    pub max_candidates: usize,
}

impl Default for LiveMarketConfig {
    fn default() -> Self {
        Self {
            ema_fast: default_live_ema_fast(),
            ema_slow: default_live_ema_slow(),
            volume_lookback: default_live_volume_lookback(),
            min_volume_ratio: default_min_volume_ratio(),
            min_range_pct: default_min_range_pct(),
            opening_range_bars: default_opening_range_bars(),
            proximity_pct: default_proximity_pct(),
            max_candidates: default_live_candidates(),
        }
    }
}

fn default_live_ema_fast() -> usize {
    20
}

fn default_live_ema_slow() -> usize {
    200
}

fn default_live_volume_lookback() -> usize {
    10
}

fn default_min_volume_ratio() -> f64 {
    1.2
}

fn default_min_range_pct() -> f64 {
    0.8
}

fn default_opening_range_bars() -> usize {
    15 // ~15 minutes of 1-minute bars
}

fn default_proximity_pct() -> f64 {
    0.5
}

fn default_live_candidates() -> usize {
    4
}

// ============================================================================
// Signal Generation
// ============================================================================

/// Thresholds for the BUY/SELL rule evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Maximum distance from the fast EMA counted as a pullback (%)
    #[serde(default = "default_pullback_pct")]
    pub pullback_pct: f64,
    /// Bars to look back for an EMA touch when the distance test fails
    #[serde(default = "default_pullback_lookback")]
    pub pullback_lookback: usize,
    /// Minimum volume ratio for signal confirmation
    #[serde(default = "default_min_volume_ratio")]
    pub min_volume_ratio: f64,
    /// Bars in the signal volume baseline (excluding the signal bar)
    #[serde(default = "default_live_volume_lookback")]
    pub volume_lookback: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            pullback_pct: default_pullback_pct(),
            pullback_lookback: default_pullback_lookback(),
            min_volume_ratio: default_min_volume_ratio(),
            volume_lookback: default_live_volume_lookback(),
        }
    }
}

fn default_pullback_pct() -> f64 {
    0.5
}

fn default_pullback_lookback() -> usize {
    3
}

// ============================================================================
// Risk Management
// ============================================================================

/// Fixed-fractional sizing and session risk limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Capital percentage risked per trade
    #[serde(default = "default_risk_per_trade_pct")]
    pub risk_per_trade_pct: f64,
    /// Maximum trades admitted per day
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,
    /// Consecutive-loss circuit breaker
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
    /// ATR period used for stop placement
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// ATR multiplier for the stop distance
    #[serde(default = "default_stop_loss_atr_multiplier")]
    pub stop_loss_atr_multiplier: f64,
    /// Reward-to-risk ratio for the target
    #[serde(default = "default_reward_ratio")]
    pub reward_ratio: f64,
    /// Maximum position value as % of capital
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,
    /// Trading halts when capital falls below this % of initial
    #[serde(default = "default_capital_floor_pct")]
    pub capital_floor_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: default_risk_per_trade_pct(),
            max_trades_per_day: default_max_trades_per_day(),
            max_consecutive_losses: default_max_consecutive_losses(),
            atr_period: default_atr_period(),
            stop_loss_atr_multiplier: default_stop_loss_atr_multiplier(),
            reward_ratio: default_reward_ratio(),
            max_position_pct: default_max_position_pct(),
            capital_floor_pct: default_capital_floor_pct(),
        }
    }
}

fn default_risk_per_trade_pct() -> f64 {
    1.0
}

fn default_max_trades_per_day() -> u32 {
    3
}

fn default_max_consecutive_losses() -> u32 {
    2
}

fn default_atr_period() -> usize {
    14
}

fn default_stop_loss_atr_multiplier() -> f64 {
    1.5
}

fn default_reward_ratio() -> f64 {
    2.0
}

fn default_max_position_pct() -> f64 {
    20.0
}

fn default_capital_floor_pct() -> f64 {
    20.0
}

// ============================================================================
// Backtest
// ============================================================================

/// Backtest driver parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Target-hit probability of the Monte-Carlo exit model.
    ///
    /// A modeling simplification, not derived from data.
    #[serde(default = "default_win_probability")]
    pub win_probability: f64,
    /// Default starting capital when the caller does not supply one
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            win_probability: default_win_probability(),
            initial_capital: default_initial_capital(),
        }
    }
}

fn default_win_probability() -> f64 {
    0.6
}

fn default_initial_capital() -> f64 {
    100_000.0
}

// ============================================================================
// Server & Output
// ============================================================================

/// HTTP server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4460
}

/// Report file output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for JSON result reports; disabled when unset
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

// ============================================================================
// Tests
// ============================================================================
