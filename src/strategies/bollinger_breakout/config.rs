use serde::{Deserialize, Serialize};

/// Configuration for Bollinger Breakout Strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BollingerBreakoutConfig {
    #[serde(default = "default_bb_period")]
    pub bb_period: usize,

    /// Band width in standard deviations (default: 2.0)
    #[serde(default = "default_bb_std")]
    pub bb_std: f64,

    #[serde(default = "default_buy_confidence")]
    pub buy_confidence: f64,

    #[serde(default = "default_sell_confidence")]
    pub sell_confidence: f64,

    #[serde(default = "default_hold_confidence")]
    pub hold_confidence: f64,

    #[serde(default = "default_stop_pct")]
    pub stop_pct: f64,

    #[serde(default = "default_target_pct")]
    pub target_pct: f64,
}

fn default_bb_period() -> usize {
    20
}

fn default_bb_std() -> f64 {
    2.0
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

fn default_stop_pct() -> f64 {
    0.02
}

fn default_target_pct() -> f64 {
    0.05
}

impl Default for BollingerBreakoutConfig {
    fn default() -> Self {
        Self {
            bb_period: default_bb_period(),
            bb_std: default_bb_std(),
            buy_confidence: default_buy_confidence(),
            sell_confidence: default_sell_confidence(),
            hold_confidence: default_hold_confidence(),
            stop_pct: default_stop_pct(),
            target_pct: default_target_pct(),
        }
    }
}
