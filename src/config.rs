//! Configuration management
//!
//! Loads a JSON configuration file (every section optional) and layers
//! environment variables on top, after `.env` has been read by `dotenv`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bot::BotSettings;
use crate::common::BreakerConfig;
use crate::exchange::BinanceConfig;

pub const DEFAULT_CONFIG_PATH: &str = "configs/default.json";

/// Development-only signing key used when none is configured
pub const DEV_JWT_SECRET: &str = "deep-signal-dev-secret-change-me";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub vault: VaultConfig,
}

impl AppConfig {
    /// Load configuration from JSON file, then apply environment overrides.
    /// A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON file without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        serde_json::from_str(&contents).context("Failed to parse config JSON")
    }

    /// Layer variables from `lookup` (normally the process environment) over the file values
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DEEP_SIGNAL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DEEP_SIGNAL_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(secret) = lookup("DEEP_SIGNAL_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(db) = lookup("DEEP_SIGNAL_DATABASE") {
            self.database.path = PathBuf::from(db);
        }
        if let Some(key) = lookup("DEEP_SIGNAL_ENCRYPTION_KEY") {
            self.vault.encryption_key = Some(key);
        }
        if let Some(flag) = lookup("BINANCE_TESTNET").and_then(|v| parse_flag(&v)) {
            self.exchange.testnet = flag;
        }
        if let Some(flag) = lookup("DEEP_SIGNAL_PAPER").and_then(|v| parse_flag(&v)) {
            self.trading.paper_trading = flag;
        }
        if let Some(flag) = lookup("DEEP_SIGNAL_FALLBACK").and_then(|v| parse_flag(&v)) {
            self.exchange.fallback_enabled = flag;
        }
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.auth.token_ttl_minutes <= 0 {
            bail!("auth.token_ttl_minutes must be positive");
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            bail!("auth.bcrypt_cost must be within 4..=31");
        }
        if self.trading.paper_starting_balance < 0.0 {
            bail!("trading.paper_starting_balance cannot be negative");
        }

        let bot = &self.trading.bot;
        if bot.quantity <= 0.0 {
            bail!("trading.bot.quantity must be positive");
        }
        if !(0.0..=1.0).contains(&bot.min_confidence) {
            bail!("trading.bot.min_confidence must be within 0..=1");
        }
        if bot.interval.trim().is_empty() {
            bail!("trading.bot.interval cannot be empty");
        }
        if bot.poll_interval_secs == 0 {
            bail!("trading.bot.poll_interval_secs must be positive");
        }
        if bot.kline_limit == 0 {
            bail!("trading.bot.kline_limit must be positive");
        }
        Ok(())
    }

    /// JWT signing secret, falling back to a development key with a warning
    pub fn jwt_secret(&self) -> String {
        match self.auth.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                tracing::warn!(
                    "No JWT secret configured (DEEP_SIGNAL_JWT_SECRET); using the development key"
                );
                DEV_JWT_SECRET.to_string()
            }
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    pub token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: None,
            token_ttl_minutes: crate::auth::DEFAULT_TOKEN_TTL_MINUTES,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("data/deep_signal.db"),
        }
    }
}

/// Exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub testnet: bool,
    /// Overrides the mainnet/testnet base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Never touch the network: fallback market data and paper fills
    pub offline: bool,
    /// Serve fallback market data when Binance is unavailable
    pub fallback_enabled: bool,
    /// Check new API keys against the exchange before saving them
    pub verify_keys: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub min_request_interval_ms: u64,
    pub recv_window_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            testnet: false,
            base_url: None,
            offline: false,
            fallback_enabled: true,
            verify_keys: false,
            timeout_secs: 10,
            max_retries: 3,
            min_request_interval_ms: 100,
            recv_window_ms: 5000,
            breaker_failure_threshold: 5,
            breaker_cooldown_secs: 30,
        }
    }
}

impl ExchangeConfig {
    pub fn binance_config(&self) -> BinanceConfig {
        let mut config = if self.testnet {
            BinanceConfig::testnet()
        } else {
            BinanceConfig::mainnet()
        };
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        config = config
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_retries(self.max_retries)
            .with_min_request_interval(Duration::from_millis(self.min_request_interval_ms));
        config.recv_window = self.recv_window_ms;
        config.breaker = BreakerConfig::default()
            .with_failure_threshold(self.breaker_failure_threshold)
            .with_cooldown(Duration::from_secs(self.breaker_cooldown_secs));
        config
    }
}

/// Trading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Fill orders against simulated balances instead of the user's exchange account
    pub paper_trading: bool,
    pub paper_quote_asset: String,
    pub paper_starting_balance: f64,
    pub default_strategy: String,
    /// Defaults for auto-trading bots; start requests may override some fields
    pub bot: BotSettings,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            paper_trading: true,
            paper_quote_asset: "USDT".to_string(),
            paper_starting_balance: 10_000.0,
            default_strategy: "trend_following".to_string(),
            bot: BotSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.token_ttl_minutes, 30);
        assert!(config.exchange.fallback_enabled);
        assert_eq!(config.trading.bot.symbol, "BTCUSDT");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "server": { "port": 9000 }, "trading": { "bot": { "symbol": "ETHUSDT" } } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.trading.bot.symbol, "ETHUSDT");
        assert_eq!(config.trading.bot.interval, "15m");
        assert_eq!(config.trading.default_strategy, "trend_following");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DEEP_SIGNAL_PORT", "9100"),
            ("DEEP_SIGNAL_JWT_SECRET", "s3cret"),
            ("DEEP_SIGNAL_DATABASE", "/tmp/x.db"),
            ("BINANCE_TESTNET", "true"),
            ("DEEP_SIGNAL_PAPER", "0"),
            ("DEEP_SIGNAL_FALLBACK", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.jwt_secret(), "s3cret");
        assert_eq!(config.database.path, PathBuf::from("/tmp/x.db"));
        assert!(config.exchange.testnet);
        assert!(!config.trading.paper_trading);
        assert!(!config.exchange.fallback_enabled);
    }

    #[test]
    fn test_unparseable_override_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            "DEEP_SIGNAL_PORT" => Some("not-a-port".to_string()),
            "BINANCE_TESTNET" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 8000);
        assert!(!config.exchange.testnet);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.bcrypt_cost = 3;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.trading.bot.min_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.trading.bot.quantity = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.trading.bot.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_binance_config_mapping() {
        let mut exchange = ExchangeConfig::default();
        exchange.testnet = true;
        exchange.max_retries = 1;
        let binance = exchange.binance_config();
        assert_eq!(binance.base_url, crate::exchange::binance::TESTNET_BASE_URL);
        assert_eq!(binance.max_retries, 1);
        assert_eq!(binance.breaker.failure_threshold, 5);

        exchange.base_url = Some("http://127.0.0.1:9999/api/v3/".to_string());
        assert_eq!(exchange.binance_config().base_url, "http://127.0.0.1:9999/api/v3");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load("/definitely/not/here.json").unwrap();
        assert_eq!(config.trading.paper_quote_asset, "USDT");
    }
}
