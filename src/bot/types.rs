use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Analysis, Side};

/// Knobs for one auto-trading bot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub symbol: String,
    /// Base asset quantity per order
    pub quantity: f64,
    pub interval: String,
    pub kline_limit: u32,
    pub poll_interval_secs: u64,
    /// Entries need a confidence strictly above this
    pub min_confidence: f64,
    /// Unrealized loss, in percent of entry, that forces an exit
    pub forced_exit_pct: f64,
    pub max_trade_log: usize,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            quantity: 0.001,
            interval: "15m".to_string(),
            kline_limit: 50,
            poll_interval_secs: 60,
            min_confidence: 0.7,
            forced_exit_pct: 10.0,
            max_trade_log: 1000,
        }
    }
}

impl BotSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotPosition {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_time: DateTime<Utc>,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_id: Option<i64>,
}

impl BotPosition {
    /// Exit reason if `price` crosses the stop or target
    pub fn exit_trigger(&self, price: f64) -> Option<&'static str> {
        match self.side {
            Side::Buy if price <= self.stop_loss => Some("stop_loss"),
            Side::Buy if price >= self.take_profit => Some("take_profit"),
            Side::Sell if price >= self.stop_loss => Some("stop_loss"),
            Side::Sell if price <= self.take_profit => Some("take_profit"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Entry,
    Exit,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: TradeKind,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub reason: String,
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingStats {
    /// Completed round trips
    pub total_trades: u64,
    pub winning_trades: u64,
    pub win_rate: f64,
    pub total_pnl: f64,
    /// Latest trade log entries, newest last
    pub recent: Vec<TradeLogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub is_running: bool,
    pub current_strategy: String,
    pub symbol: String,
    pub interval: String,
    pub quantity: f64,
    pub active_positions: usize,
    pub positions: Vec<BotPosition>,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_analysis: Option<Analysis>,
    pub last_error: Option<String>,
    pub stats: TradingStats,
}

impl BotStatus {
    /// Status for a user who has no bot yet
    pub fn idle(strategy: &str, settings: &BotSettings) -> Self {
        Self {
            is_running: false,
            current_strategy: strategy.to_string(),
            symbol: settings.symbol.clone(),
            interval: settings.interval.clone(),
            quantity: settings.quantity,
            active_positions: 0,
            positions: Vec::new(),
            cycles: 0,
            last_cycle_at: None,
            last_analysis: None,
            last_error: None,
            stats: TradingStats::default(),
        }
    }
}
