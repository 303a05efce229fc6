use serde::{Deserialize, Serialize};

/// Configuration for RSI Momentum Strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsiMomentumConfig {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// Length of the RSI signal average (default: 3)
    #[serde(default = "default_signal_period")]
    pub signal_period: usize,

    /// BUY only while RSI stays below this level (default: 60)
    #[serde(default = "default_buy_ceiling")]
    pub buy_ceiling: f64,

    /// SELL only while RSI stays above this level (default: 40)
    #[serde(default = "default_sell_floor")]
    pub sell_floor: f64,

    #[serde(default = "default_buy_confidence")]
    pub buy_confidence: f64,

    #[serde(default = "default_sell_confidence")]
    pub sell_confidence: f64,

    #[serde(default = "default_hold_confidence")]
    pub hold_confidence: f64,

    #[serde(default = "default_stop_loss_factor")]
    pub stop_loss_factor: f64,

    #[serde(default = "default_take_profit_factor")]
    pub take_profit_factor: f64,
}

fn default_rsi_period() -> usize {
    14
}

fn default_signal_period() -> usize {
    3
}

fn default_buy_ceiling() -> f64 {
    60.0
}

fn default_sell_floor() -> f64 {
    40.0
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
    1.04
}

impl Default for RsiMomentumConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            signal_period: default_signal_period(),
            buy_ceiling: default_buy_ceiling(),
            sell_floor: default_sell_floor(),
            buy_confidence: default_buy_confidence(),
            sell_confidence: default_sell_confidence(),
            hold_confidence: default_hold_confidence(),
            stop_loss_factor: default_stop_loss_factor(),
            take_profit_factor: default_take_profit_factor(),
        }
    }
}
