use serde::{Deserialize, Serialize};

/// Configuration for Mean Reversion Strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanReversionConfig {
    /// RSI period (default: 14)
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// RSI oversold threshold (default: 30)
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,

    /// RSI overbought threshold (default: 70)
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,

    #[serde(default = "default_buy_confidence")]
    pub buy_confidence: f64,

    #[serde(default = "default_sell_confidence")]
    pub sell_confidence: f64,

    #[serde(default = "default_hold_confidence")]
    pub hold_confidence: f64,

    /// Stop loss as a multiple of price (default: 0.97)
    #[serde(default = "default_stop_loss_factor")]
    pub stop_loss_factor: f64,

    /// Take profit as a multiple of price (default: 1.03)
    #[serde(default = "default_take_profit_factor")]
    pub take_profit_factor: f64,
}

fn default_rsi_period() -> usize {
    14
}

fn default_rsi_oversold() -> f64 {
    30.0
}

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_buy_confidence() -> f64 {
    0.75
}

fn default_sell_confidence() -> f64 {
    0.65
}

fn default_hold_confidence() -> f64 {
    0.5
}

fn default_stop_loss_factor() -> f64 {
    0.97
}

fn default_take_profit_factor() -> f64 {
    1.03
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            rsi_oversold: default_rsi_oversold(),
            rsi_overbought: default_rsi_overbought(),
            buy_confidence: default_buy_confidence(),
            sell_confidence: default_sell_confidence(),
            hold_confidence: default_hold_confidence(),
            stop_loss_factor: default_stop_loss_factor(),
            take_profit_factor: default_take_profit_factor(),
        }
    }
}
