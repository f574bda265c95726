use crate::models::Thresholds;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://nami.exchange/api/v4";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What the poller does when the price stays past a threshold for several ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Place an order on every tick while the price is past a threshold.
    #[default]
    EveryTick,
    /// Place one order per crossing; re-arm once the price is back between thresholds.
    OncePerCrossing,
}

/// Exchange connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// REST base URL; signed paths are relative to it.
    pub base_url: String,
    /// Trading pair in exchange notation (e.g. "BTC_USDT").
    pub symbol: String,
    /// Deadline for each outbound HTTP call.
    pub timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            symbol: "BTC_USDT".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Threshold strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// Order size for threshold-triggered orders.
    pub quantity: Decimal,
    pub poll_interval_secs: u64,
    pub repeat_policy: RepeatPolicy,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            buy_price: dec!(30000),
            sell_price: dec!(32000),
            quantity: dec!(0.001),
            poll_interval_secs: 10,
            repeat_policy: RepeatPolicy::EveryTick,
        }
    }
}

impl StrategyConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            buy_price: self.buy_price,
            sell_price: self.sell_price,
        }
    }
}

/// Control API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// When set, `/trigger` applies the threshold rule and places the order it calls for.
    pub trigger_executes: bool,
}

/// Non-secret bot configuration. Credentials and the webhook token come from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub exchange: ExchangeConfig,
    pub strategy: StrategyConfig,
    pub api: ApiConfig,
}

impl BotConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.strategy;
        if s.buy_price >= s.sell_price {
            return Err(ConfigError::Invalid(format!(
                "buy_price ({}) must be below sell_price ({})",
                s.buy_price, s.sell_price
            )));
        }
        if s.quantity <= Decimal::ZERO {
            return Err(ConfigError::Invalid("quantity must be positive".to_string()));
        }
        if s.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.exchange.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.exchange.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".to_string()));
        }
        Ok(())
    }
}
