//! Trend Following Configuration

use serde::{Deserialize, Serialize};

/// Configuration for Trend Following Strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendFollowingConfig {
    /// Fast SMA period (default: 20)
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,

    /// Slow SMA period (default: 50)
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,

    /// Confidence of an uptrend BUY (default: 0.8)
    #[serde(default = "default_buy_confidence")]
    pub buy_confidence: f64,

    /// Confidence of a downtrend SELL (default: 0.7)
    #[serde(default = "default_sell_confidence")]
    pub sell_confidence: f64,

    /// Confidence reported with HOLD (default: 0.5)
    #[serde(default = "default_hold_confidence")]
    pub hold_confidence: f64,

    /// Stop loss as a multiple of price (default: 0.98)
    #[serde(default = "default_stop_loss_factor")]
    pub stop_loss_factor: f64,

    /// Take profit as a multiple of price (default: 1.04)
    #[serde(default = "default_take_profit_factor")]
    pub take_profit_factor: f64,
}

fn default_fast_period() -> usize {
    20
}

fn default_slow_period() -> usize {
    50
}

fn default_buy_confidence() -> f64 {
    0.8
}

fn default_sell_confidence() -> f64 {
    0.7
}

fn default_hold_confidence() -> f64 {
    0.5
}

fn default_stop_loss_factor() -> f64 {
    0.98
}

fn default_take_profit_factor() -> f64 {
    1.04
}

impl Default for TrendFollowingConfig {
    fn default() -> Self {
        Self {
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            buy_confidence: default_buy_confidence(),
            sell_confidence: default_sell_confidence(),
            hold_confidence: default_hold_confidence(),
            stop_loss_factor: default_stop_loss_factor(),
            take_profit_factor: default_take_profit_factor(),
        }
    }
}
