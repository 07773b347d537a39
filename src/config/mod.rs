//! Configuration management for the scalp ladder.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Market data and paper execution settings
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Per-scalp trade parameters
    #[serde(default)]
    pub scalp: ScalpConfig,
    /// Depth ladder and run budget
    #[serde(default)]
    pub ladder: LadderConfig,
    /// Moving-average admission gate
    #[serde(default)]
    pub signal: SignalConfig,
    /// Control loop timing
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Closed-scalp reporting
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Use the spot testnet for market data
    #[serde(default)]
    pub testnet: bool,
    /// HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Replay tickers from this CSV instead of the live API
    #[serde(default)]
    pub offline_tickers_file: Option<String>,
    /// Commission applied by the paper leg executor
    #[serde(default = "default_paper_fee_rate")]
    pub paper_fee_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalpConfig {
    /// Trading pair as "BASE/QUOTE"
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Currency spent by leg 1 and recovered by leg 2
    #[serde(default = "default_start_currency")]
    pub start_currency: String,
    #[serde(default = "default_dest_currency")]
    pub dest_currency: String,
    /// Amount of start currency per scalp
    #[serde(default = "default_start_amount")]
    pub start_amount: Decimal,
    /// Desired net profit per scalp (0.0-1.0)
    #[serde(default = "default_profit")]
    pub profit: Decimal,
    /// Commission charged per leg (0.0-1.0)
    #[serde(default = "default_commission")]
    pub commission: Decimal,
    /// Unfilled remainder (base currency) below which a leg is not cancelled
    #[serde(default = "default_cancel_threshold")]
    pub cancel_threshold: Decimal,
    #[serde(default = "default_order1_max_updates")]
    pub order1_max_updates: u32,
    #[serde(default = "default_order2_max_updates_for_profit")]
    pub order2_max_updates_for_profit: u32,
    #[serde(default = "default_order2_max_updates_market")]
    pub order2_max_updates_market: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Maximum concurrently active scalps, one per depth slot
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Number of admission batches before the loop winds down
    #[serde(default = "default_max_runs")]
    pub max_runs: u32,
    /// Completed first legs that close one run
    #[serde(default = "default_max_leg1_per_run")]
    pub max_leg1_per_run: u32,
    /// Price distance between neighbouring depths, in units of the profit target
    #[serde(default = "default_depth_step")]
    pub depth_step: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    #[serde(default = "default_long_window")]
    pub long_window: usize,
    /// Extra history kept beyond the long window
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Relative MA delta a buy must exceed (or a sell must fall below)
    #[serde(default = "default_threshold")]
    pub threshold: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Sleep after each tick, in milliseconds
    #[serde(default = "default_tick_delay_ms")]
    pub tick_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// CSV file receiving one row per closed scalp
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
    /// Optional SQLite store for the `status` command
    #[serde(default)]
    pub db_path: Option<String>,
    /// Optional HTTP endpoint receiving each report as JSON
    #[serde(default)]
    pub remote_url: Option<String>,
}

// Default value functions
fn default_request_timeout() -> u64 {
    10
}

fn default_paper_fee_rate() -> Decimal {
    Decimal::new(7, 4) // 0.0007
}

fn default_symbol() -> String {
    "ETH/BTC".to_string()
}

fn default_start_currency() -> String {
    "BTC".to_string()
}

fn default_dest_currency() -> String {
    "ETH".to_string()
}

fn default_start_amount() -> Decimal {
    Decimal::new(1, 2) // 0.01 BTC
}

fn default_profit() -> Decimal {
    Decimal::new(1, 3) // 0.001
}

fn default_commission() -> Decimal {
    Decimal::new(7, 4) // 0.0007
}

fn default_cancel_threshold() -> Decimal {
    Decimal::new(1, 2) // 0.01 ETH
}

fn default_order1_max_updates() -> u32 {
    10
}

fn default_order2_max_updates_for_profit() -> u32 {
    10
}

fn default_order2_max_updates_market() -> u32 {
    5
}

fn default_max_depth() -> u32 {
    5
}

fn default_max_runs() -> u32 {
    1
}

fn default_max_leg1_per_run() -> u32 {
    5
}

fn default_depth_step() -> Decimal {
    Decimal::ONE
}

fn default_short_window() -> usize {
    5
}

fn default_long_window() -> usize {
    20
}

fn default_lookback() -> usize {
    5
}

fn default_threshold() -> Decimal {
    Decimal::new(1, 4) // 0.0001
}

fn default_tick_delay_ms() -> u64 {
    1000
}

fn default_csv_path() -> String {
    "reports/scalps.csv".to_string()
}

impl Config {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::default().separator("__").prefix("SCALP"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let fraction = |v: Decimal| v > Decimal::ZERO && v < Decimal::ONE;

        anyhow::ensure!(
            fraction(self.scalp.profit),
            "profit must be between 0 and 1"
        );

        anyhow::ensure!(
            fraction(self.scalp.commission),
            "commission must be between 0 and 1"
        );

        anyhow::ensure!(
            self.scalp.start_amount > Decimal::ZERO,
            "start_amount must be positive"
        );

        anyhow::ensure!(
            self.scalp.start_currency != self.scalp.dest_currency,
            "start_currency and dest_currency must differ"
        );

        anyhow::ensure!(
            self.scalp.order2_max_updates_for_profit + self.scalp.order2_max_updates_market
                >= self.scalp.order1_max_updates,
            "leg 2 update budget must not be smaller than leg 1's"
        );

        anyhow::ensure!(self.ladder.max_depth >= 1, "max_depth must be >= 1");

        anyhow::ensure!(
            self.ladder.max_leg1_per_run >= 1,
            "max_leg1_per_run must be >= 1"
        );

        anyhow::ensure!(
            self.signal.short_window >= 1 && self.signal.short_window <= self.signal.long_window,
            "signal windows must satisfy 0 < short_window <= long_window"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            scalp: ScalpConfig::default(),
            ladder: LadderConfig::default(),
            signal: SignalConfig::default(),
            runtime: RuntimeConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            request_timeout_secs: default_request_timeout(),
            offline_tickers_file: None,
            paper_fee_rate: default_paper_fee_rate(),
        }
    }
}

impl Default for ScalpConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            start_currency: default_start_currency(),
            dest_currency: default_dest_currency(),
            start_amount: default_start_amount(),
            profit: default_profit(),
            commission: default_commission(),
            cancel_threshold: default_cancel_threshold(),
            order1_max_updates: default_order1_max_updates(),
            order2_max_updates_for_profit: default_order2_max_updates_for_profit(),
            order2_max_updates_market: default_order2_max_updates_market(),
        }
    }
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_runs: default_max_runs(),
            max_leg1_per_run: default_max_leg1_per_run(),
            depth_step: default_depth_step(),
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            short_window: default_short_window(),
            long_window: default_long_window(),
            lookback: default_lookback(),
            threshold: default_threshold(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_delay_ms: default_tick_delay_ms(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            db_path: None,
            remote_url: None,
        }
    }
}
