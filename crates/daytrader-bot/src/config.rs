//! Application configuration.

use crate::error::{AppError, AppResult};
use chrono::Duration;
use daytrader_core::Instrument;
use daytrader_executor::{BuyWindow, TraderConfig};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `DAYTRADER__ACCOUNT` or
/// `DAYTRADER__EXECUTOR__HEARTBEAT_MS`.
pub const ENV_PREFIX: &str = "DAYTRADER";

/// Upper bound for `strategy.freshness_ms` and `executor.request_timeout_ms`
/// (one day).
pub const MAX_WINDOW_MS: u64 = 86_400_000;

/// Instrument as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Order and quote key.
    pub code: String,
    /// Display name used in holdings rows.
    pub name: String,
}

impl InstrumentConfig {
    pub fn to_instrument(&self) -> AppResult<Instrument> {
        Ok(Instrument::try_new(self.code.clone(), self.name.clone())?)
    }
}

/// Decision rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Buy window hour threshold. Default: 13.
    #[serde(default = "default_buy_window_hour")]
    pub buy_window_hour: u32,
    /// Buy window minute threshold. Default: 30.
    #[serde(default = "default_buy_window_minute")]
    pub buy_window_minute: u32,
    /// Maximum quote age, either direction (ms). Default: 1000.
    #[serde(default = "default_freshness_ms")]
    pub freshness_ms: u64,
}

fn default_buy_window_hour() -> u32 {
    13
}

fn default_buy_window_minute() -> u32 {
    30
}

fn default_freshness_ms() -> u64 {
    1_000
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            buy_window_hour: default_buy_window_hour(),
            buy_window_minute: default_buy_window_minute(),
            freshness_ms: default_freshness_ms(),
        }
    }
}

/// Trader driving configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Heartbeat tick interval (ms). Default: 500.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    /// Drop an unanswered gateway query after this long (ms).
    /// Unset waits forever.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_heartbeat_ms() -> u64 {
    500
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: default_heartbeat_ms(),
            request_timeout_ms: None,
        }
    }
}

/// Paper brokerage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Session open, local "HH:MM". Default: "09:00".
    #[serde(default = "default_session_open")]
    pub session_open: String,
    /// Session close, local "HH:MM". Default: "15:30".
    #[serde(default = "default_session_close")]
    pub session_close: String,
    /// Quantity of the target held at startup. Default: 0.
    #[serde(default)]
    pub initial_held: u64,
    /// Synthetic quote publish interval (ms). Default: 250.
    #[serde(default = "default_quote_interval_ms")]
    pub quote_interval_ms: u64,
    /// Center price of synthetic quotes. Default: 70,000.
    #[serde(default = "default_base_price")]
    pub base_price: i64,
    /// Price step between depth levels. Default: 100.
    #[serde(default = "default_tick_size")]
    pub tick_size: i64,
    /// Depth levels per side. Default: 5.
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
    /// Quantity available at each level. Default: 50.
    #[serde(default = "default_level_quantity")]
    pub level_quantity: u64,
}

fn default_session_open() -> String {
    "09:00".to_string()
}

fn default_session_close() -> String {
    "15:30".to_string()
}

fn default_quote_interval_ms() -> u64 {
    250
}

fn default_base_price() -> i64 {
    70_000
}

fn default_tick_size() -> i64 {
    100
}

fn default_depth_levels() -> usize {
    5
}

fn default_level_quantity() -> u64 {
    50
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            session_open: default_session_open(),
            session_close: default_session_close(),
            initial_held: 0,
            quote_interval_ms: default_quote_interval_ms(),
            base_price: default_base_price(),
            tick_size: default_tick_size(),
            depth_levels: default_depth_levels(),
            level_quantity: default_level_quantity(),
        }
    }
}

/// Logging and statistics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default tracing filter when `RUST_LOG` is unset. Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Statistics summary interval (seconds). Default: 3600.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_interval_secs() -> u64 {
    3_600
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Brokerage account identifier.
    pub account: String,
    /// Fixed quantity bought inside the buy window. Default: 1.
    #[serde(default = "default_quantity")]
    pub quantity: u64,
    /// Instrument the strategy trades.
    pub target: InstrumentConfig,
    /// Extra instruments whose quotes must be fresh before deciding.
    #[serde(default)]
    pub tracked: Vec<InstrumentConfig>,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_quantity() -> u64 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            account: "00000000-00".to_string(),
            quantity: default_quantity(),
            target: InstrumentConfig {
                code: "005930".to_string(),
                name: "Samsung Electronics".to_string(),
            },
            tracked: Vec::new(),
            strategy: StrategyConfig::default(),
            executor: ExecutorConfig::default(),
            paper: PaperConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file with `DAYTRADER__*` environment
    /// overrides, then validate it.
    pub fn load(path: &str) -> AppResult<Self> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::new(path, ::config::FileFormat::Toml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(content, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {e}")))
    }

    /// Reject values the trader cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.account.trim().is_empty() {
            return Err(AppError::Config("account must not be empty".to_string()));
        }
        if self.quantity == 0 {
            return Err(AppError::Config("quantity must be positive".to_string()));
        }
        self.target.to_instrument()?;
        for tracked in &self.tracked {
            tracked.to_instrument()?;
        }

        if self.strategy.buy_window_hour > 23 {
            return Err(AppError::Config(format!(
                "strategy.buy_window_hour out of range: {}",
                self.strategy.buy_window_hour
            )));
        }
        if self.strategy.buy_window_minute > 59 {
            return Err(AppError::Config(format!(
                "strategy.buy_window_minute out of range: {}",
                self.strategy.buy_window_minute
            )));
        }
        if self.strategy.freshness_ms == 0 || self.strategy.freshness_ms > MAX_WINDOW_MS {
            return Err(AppError::Config(format!(
                "strategy.freshness_ms must be in 1..={MAX_WINDOW_MS}: {}",
                self.strategy.freshness_ms
            )));
        }
        if self.executor.heartbeat_ms == 0 {
            return Err(AppError::Config(
                "executor.heartbeat_ms must be positive".to_string(),
            ));
        }
        if let Some(ms) = self.executor.request_timeout_ms {
            if ms == 0 || ms > MAX_WINDOW_MS {
                return Err(AppError::Config(format!(
                    "executor.request_timeout_ms must be in 1..={MAX_WINDOW_MS} when set: {ms}"
                )));
            }
        }
        if self.telemetry.stats_interval_secs == 0 {
            return Err(AppError::Config(
                "telemetry.stats_interval_secs must be positive".to_string(),
            ));
        }

        self.validate_paper()
    }

    fn validate_paper(&self) -> AppResult<()> {
        let paper = &self.paper;
        let open = crate::paper::parse_session_time(&paper.session_open)?;
        let close = crate::paper::parse_session_time(&paper.session_close)?;
        if open >= close {
            return Err(AppError::Config(format!(
                "paper session_open {} must be before session_close {}",
                paper.session_open, paper.session_close
            )));
        }
        if paper.quote_interval_ms == 0 {
            return Err(AppError::Config(
                "paper.quote_interval_ms must be positive".to_string(),
            ));
        }
        if paper.depth_levels == 0 || paper.level_quantity == 0 {
            return Err(AppError::Config(
                "paper depth must have at least one non-empty level".to_string(),
            ));
        }
        if paper.tick_size <= 0 || paper.base_price <= paper.tick_size * paper.depth_levels as i64 * 2
        {
            return Err(AppError::Config(
                "paper.base_price must stay positive across the synthetic book".to_string(),
            ));
        }
        Ok(())
    }

    pub fn target_instrument(&self) -> AppResult<Instrument> {
        self.target.to_instrument()
    }

    pub fn tracked_instruments(&self) -> AppResult<Vec<Instrument>> {
        self.tracked.iter().map(InstrumentConfig::to_instrument).collect()
    }

    /// Trader tuning derived from the strategy and executor sections.
    pub fn trader_config(&self) -> TraderConfig {
        TraderConfig {
            buy_window: BuyWindow::new(
                self.strategy.buy_window_hour,
                self.strategy.buy_window_minute,
            ),
            freshness: bounded_millis(self.strategy.freshness_ms),
            request_timeout: self.executor.request_timeout_ms.map(bounded_millis),
        }
    }

    pub fn heartbeat(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.executor.heartbeat_ms)
    }

    pub fn stats_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.telemetry.stats_interval_secs)
    }
}

fn bounded_millis(ms: u64) -> Duration {
    Duration::milliseconds(ms.min(MAX_WINDOW_MS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        account = "8000-01"

        [target]
        code = "005930"
        name = "Samsung Electronics"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.account, "8000-01");
        assert_eq!(config.quantity, 1);
        assert_eq!(config.strategy, StrategyConfig::default());
        assert_eq!(config.executor.heartbeat_ms, 500);
        assert_eq!(config.executor.request_timeout_ms, None);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.tracked.is_empty());
    }

    #[test]
    fn test_full_config() {
        let content = r#"
            account = "8000-01"
            quantity = 25

            [target]
            code = "005930"
            name = "Samsung Electronics"

            [[tracked]]
            code = "000660"
            name = "SK hynix"

            [strategy]
            buy_window_hour = 14
            buy_window_minute = 0
            freshness_ms = 2000

            [executor]
            heartbeat_ms = 200
            request_timeout_ms = 10000
        "#;

        let config = AppConfig::from_toml_str(content).unwrap();
        assert_eq!(config.quantity, 25);
        assert_eq!(
            config.tracked_instruments().unwrap(),
            vec![Instrument::new("000660", "SK hynix")]
        );

        let trader = config.trader_config();
        assert_eq!(trader.buy_window, BuyWindow::new(14, 0));
        assert_eq!(trader.freshness, Duration::seconds(2));
        assert_eq!(trader.request_timeout, Some(Duration::seconds(10)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        tokio_test::assert_ok!(config.validate());

        config.quantity = 0;
        tokio_test::assert_err!(config.validate());

        let mut config = AppConfig::default();
        config.account = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.target.name = String::new();
        assert!(matches!(config.validate(), Err(AppError::Core(_))));

        let mut config = AppConfig::default();
        config.strategy.buy_window_minute = 60;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.executor.request_timeout_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.paper.session_close = "08:00".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_durations_are_rejected() {
        let mut config = AppConfig::default();
        config.executor.request_timeout_ms = Some(u64::MAX);
        tokio_test::assert_err!(config.validate());

        config.executor.request_timeout_ms = Some(MAX_WINDOW_MS);
        tokio_test::assert_ok!(config.validate());

        let mut config = AppConfig::default();
        config.strategy.freshness_ms = u64::MAX;
        tokio_test::assert_err!(config.validate());

        // Unvalidated values still convert to a positive window.
        let trader = config.trader_config();
        assert_eq!(trader.freshness, Duration::milliseconds(MAX_WINDOW_MS as i64));
    }

    #[test]
    fn test_missing_target_is_rejected() {
        assert!(AppConfig::from_toml_str(r#"account = "8000-01""#).is_err());
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();

        assert!(rendered.contains("[target]"));
        assert!(rendered.contains("buy_window_hour = 13"));
        assert_eq!(AppConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
