use serde::{Deserialize, Serialize};

/// Configuration for SMA Crossover Strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmaCrossoverConfig {
    #[serde(default = "default_short_period")]
    pub short_period: usize,

    #[serde(default = "default_long_period")]
    pub long_period: usize,

    /// Relative gap between the averages required for a signal (default: 0.01)
    #[serde(default = "default_band")]
    pub band: f64,

    #[serde(default = "default_buy_confidence")]
    pub buy_confidence: f64,

    #[serde(default = "default_sell_confidence")]
    pub sell_confidence: f64,

    #[serde(default = "default_hold_confidence")]
    pub hold_confidence: f64,

    /// Stop distance as a fraction of price (default: 0.02)
    #[serde(default = "default_stop_pct")]
    pub stop_pct: f64,

    /// Target distance as a fraction of price (default: 0.06)
    #[serde(default = "default_target_pct")]
    pub target_pct: f64,
}

fn default_short_period() -> usize {
    10
}

fn default_long_period() -> usize {
    20
}

fn default_band() -> f64 {
    0.01
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

fn default_stop_pct() -> f64 {
    0.02
}

fn default_target_pct() -> f64 {
    0.06
}

impl Default for SmaCrossoverConfig {
    fn default() -> Self {
        Self {
            short_period: default_short_period(),
            long_period: default_long_period(),
            band: default_band(),
            buy_confidence: default_buy_confidence(),
            sell_confidence: default_sell_confidence(),
            hold_confidence: default_hold_confidence(),
            stop_pct: default_stop_pct(),
            target_pct: default_target_pct(),
        }
    }
}
