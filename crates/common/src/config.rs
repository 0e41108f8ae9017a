use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::models::MarginMode;

const DEFAULT_OKX_BASE_URL: &str = "https://www.okx.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("unsupported exchange: {0}")]
    UnsupportedExchange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Okx,
}

impl FromStr for ExchangeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "okx" => Ok(Self::Okx),
            other => Err(ConfigError::UnsupportedExchange(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingEnvironment {
    Live,
    Demo,
}

#[derive(Clone)]
pub struct ExchangeConfig {
    pub kind: ExchangeKind,
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
    pub environment: TradingEnvironment,
    pub base_url: String,
}

impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("kind", &self.kind)
            .field("api_key", &"***")
            .field("secret_key", &"***")
            .field("passphrase", &"***")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat the signals are read from.
    pub signal_chat_id: i64,
    /// Chat that receives order reports.
    pub notify_chat_id: i64,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***")
            .field("signal_chat_id", &self.signal_chat_id)
            .field("notify_chat_id", &self.notify_chat_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    /// Applied to the signal quantity to get the order size in contracts.
    pub size_multiplier: Decimal,
    /// Divides the order size for the position size shown in reports.
    pub display_divisor: Decimal,
    /// Wait before querying position history after a close.
    pub settling_delay: Duration,
    pub margin_mode: MarginMode,
    pub leverage: u32,
    /// Markets whose leverage is set at startup.
    pub leverage_markets: Vec<String>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            size_multiplier: Decimal::from(2),
            display_divisor: Decimal::from(100),
            settling_delay: Duration::from_secs(15),
            margin_mode: MarginMode::Cross,
            leverage: 50,
            leverage_markets: vec!["BTC-USDT-SWAP".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub telegram: TelegramConfig,
    pub trading: TradingConfig,
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) => debug!("No .env file loaded: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let kind = match get("EXCHANGE") {
            Some(v) => v.parse()?,
            None => ExchangeKind::Okx,
        };

        let environment = match get("OKX_FLAG").as_deref().map(str::trim) {
            None | Some("0") => TradingEnvironment::Live,
            Some("1") => TradingEnvironment::Demo,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "OKX_FLAG",
                    value: other.to_string(),
                    reason: "expected 0 (live) or 1 (demo)".to_string(),
                });
            }
        };

        let exchange = ExchangeConfig {
            kind,
            api_key: required("OKX_API_KEY")?,
            secret_key: required("OKX_SECRET_KEY")?,
            passphrase: required("OKX_PASSPHRASE")?,
            environment,
            base_url: get("OKX_BASE_URL").unwrap_or_else(|| DEFAULT_OKX_BASE_URL.to_string()),
        };

        let telegram = TelegramConfig {
            bot_token: required("TELEGRAM_BOT_TOKEN")?,
            signal_chat_id: parse_value("SIGNAL_CHAT_ID", &required("SIGNAL_CHAT_ID")?)?,
            notify_chat_id: parse_value("NOTIFY_CHAT_ID", &required("NOTIFY_CHAT_ID")?)?,
        };

        let defaults = TradingConfig::default();
        let size_multiplier = optional(&get, "ORDER_SIZE_MULTIPLIER", defaults.size_multiplier)?;
        let display_divisor = optional(&get, "DISPLAY_SIZE_DIVISOR", defaults.display_divisor)?;
        let settling_secs: u64 = optional(&get, "SETTLING_DELAY_SECS", defaults.settling_delay.as_secs())?;
        let leverage: u32 = optional(&get, "LEVERAGE", defaults.leverage)?;

        ensure_positive("ORDER_SIZE_MULTIPLIER", size_multiplier)?;
        ensure_positive("DISPLAY_SIZE_DIVISOR", display_divisor)?;
        if leverage == 0 {
            return Err(ConfigError::Invalid {
                key: "LEVERAGE",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let margin_mode = match get("MARGIN_MODE") {
            Some(v) => v.parse::<MarginMode>().map_err(|e| ConfigError::Invalid {
                key: "MARGIN_MODE",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.margin_mode,
        };

        let leverage_markets = match get("LEVERAGE_MARKETS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.leverage_markets,
        };

        Ok(Self {
            exchange,
            telegram,
            trading: TradingConfig {
                size_multiplier,
                display_divisor,
                settling_delay: Duration::from_secs(settling_secs),
                margin_mode,
                leverage,
                leverage_markets,
            },
        })
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn optional<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&'static str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn ensure_positive(key: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    }
}
