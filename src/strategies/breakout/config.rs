use serde::{Deserialize, Serialize};

/// Configuration for Channel Breakout Strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutConfig {
    /// Bars forming the support/resistance channel (default: 20)
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    #[serde(default = "default_buy_confidence")]
    pub buy_confidence: f64,

    #[serde(default = "default_sell_confidence")]
    pub sell_confidence: f64,

    #[serde(default = "default_hold_confidence")]
    pub hold_confidence: f64,

    /// Stop loss as a multiple of price (default: 0.98)
    #[serde(default = "default_stop_loss_factor")]
    pub stop_loss_factor: f64,

    /// Take profit as a multiple of price (default: 1.05)
    #[serde(default = "default_take_profit_factor")]
    pub take_profit_factor: f64,
}

fn default_lookback() -> usize {
    20
}

fn default_buy_confidence() -> f64 {
    0.7
}

fn default_sell_confidence() -> f64 {
    0.6
}

fn default_hold_confidence() -> f64 {
    0.5
}

fn default_stop_loss_factor() -> f64 {
    0.98
}

fn default_take_profit_factor() -> f64 {
    1.05
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            buy_confidence: default_buy_confidence(),
            sell_confidence: default_sell_confidence(),
            hold_confidence: default_hold_confidence(),
            stop_loss_factor: default_stop_loss_factor(),
            take_profit_factor: default_take_profit_factor(),
        }
    }
}
