//! Core data types shared by strategies, exchange access and the trading loop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self::new_unchecked(datetime, open, high, low, close, volume);
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (trusted sources, synthetic data)
    pub fn new_unchecked(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        Ok(())
    }
}

/// Order side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("invalid side '{}', expected BUY or SELL", other)),
        }
    }
}

/// Strategy verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// Order side for actionable verdicts, `None` for HOLD
    pub fn side(self) -> Option<Side> {
        match self {
            Action::Buy => Some(Side::Buy),
            Action::Sell => Some(Side::Sell),
            Action::Hold => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => f.write_str("BUY"),
            Action::Sell => f.write_str("SELL"),
            Action::Hold => f.write_str("HOLD"),
        }
    }
}

/// Result of running a strategy over a candle window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub action: Action,
    pub confidence: f64,
    pub reason: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub strategy: String,
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
}

impl Analysis {
    /// HOLD verdict: stop and target sit at the current price
    pub fn hold(strategy: &str, price: f64, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: Action::Hold,
            confidence,
            reason: reason.into(),
            entry_price: price,
            stop_loss: price,
            take_profit: price,
            strategy: strategy.to_string(),
            indicators: BTreeMap::new(),
        }
    }

    pub fn insufficient_data(strategy: &str, price: f64) -> Self {
        Self::hold(strategy, price, "insufficient data", 0.0)
    }

    pub fn with_indicator(mut self, key: &str, value: f64) -> Self {
        self.indicators.insert(key.to_string(), value);
        self
    }
}

/// Where a piece of market data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Binance,
    Fallback,
    Paper,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Binance => f.write_str("binance"),
            DataSource::Fallback => f.write_str("fallback"),
            DataSource::Paper => f.write_str("paper"),
        }
    }
}

/// Latest traded price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: f64,
}

/// Rolling 24 hour statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker24h {
    pub symbol: String,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub last_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub volume: f64,
    pub quote_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub timezone: String,
    pub server_time: i64,
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerTime {
    pub server_time: i64,
}

/// Account balance for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
}

impl Balance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

/// Acknowledgement of a filled (or accepted) market order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub status: String,
    pub executed_qty: f64,
    /// Volume weighted fill price, 0.0 when the venue did not report fills
    pub avg_price: f64,
    pub transact_time: i64,
}

/// Outcome of an exchange connectivity probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub status: String,
    pub server_time: i64,
    pub local_time: i64,
    pub latency_ms: i64,
}

/// Realized P&L of a round trip: (absolute, percent of entry notional)
pub fn realized_pnl(side: Side, entry_price: f64, exit_price: f64, quantity: f64) -> (f64, f64) {
    let pnl = match side {
        Side::Buy => (exit_price - entry_price) * quantity,
        Side::Sell => (entry_price - exit_price) * quantity,
    };
    let notional = entry_price * quantity;
    let pct = if notional > 0.0 {
        pnl / notional * 100.0
    } else {
        0.0
    };
    (pnl, pct)
}

const QUOTE_ASSETS: &[&str] = &["FDUSD", "USDT", "BUSD", "USDC", "BTC", "ETH", "BNB"];

/// Split a pair like `BTCUSDT` into `("BTC", "USDT")`
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    QUOTE_ASSETS.iter().find_map(|quote| {
        symbol
            .strip_suffix(quote)
            .filter(|base| !base.is_empty())
            .map(|base| (base, *quote))
    })
}

/// Normalize user supplied symbols: trims, upper-cases, and rejects anything non alphanumeric
pub fn normalize_symbol(symbol: &str) -> Option<String> {
    let s = symbol.trim().to_ascii_uppercase();
    if s.is_empty() || s.len() > 20 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(s)
}
