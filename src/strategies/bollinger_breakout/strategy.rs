use crate::indicators::{bollinger_bands, closes, last_value};
use crate::strategies::Strategy;
use crate::{Action, Analysis, Candle, Side};

use super::config::BollingerBreakoutConfig;

const NAME: &str = "bollinger_breakout";

pub struct BollingerBreakoutStrategy {
    config: BollingerBreakoutConfig,
}

impl BollingerBreakoutStrategy {
    pub fn new(config: BollingerBreakoutConfig) -> Self {
        BollingerBreakoutStrategy { config }
    }

    fn levels(&self, side: Side, price: f64) -> (f64, f64) {
        let (stop, target) = (self.config.stop_pct, self.config.target_pct);
        match side {
            Side::Buy => (price * (1.0 - stop), price * (1.0 + target)),
            Side::Sell => (price * (1.0 + stop), price * (1.0 - target)),
        }
    }
}

impl Strategy for BollingerBreakoutStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Trades closes outside the Bollinger Bands"
    }

    fn min_candles(&self) -> usize {
        self.config.bb_period
    }

    fn analyze(&self, candles: &[Candle]) -> Analysis {
        let price = candles.last().map(|c| c.close).unwrap_or(0.0);
        if candles.len() < self.min_candles() {
            return Analysis::insufficient_data(NAME, price);
        }

        let (upper, middle, lower) =
            bollinger_bands(&closes(candles), self.config.bb_period, self.config.bb_std);
        let (Some(upper), Some(middle), Some(lower)) =
            (last_value(&upper), last_value(&middle), last_value(&lower))
        else {
            return Analysis::insufficient_data(NAME, price);
        };

        let cfg = &self.config;
        let analysis = if price > upper {
            let (stop_loss, take_profit) = self.levels(Side::Buy, price);
            Analysis {
                action: Action::Buy,
                confidence: cfg.buy_confidence,
                reason: format!("Close above upper band {:.4}", upper),
                entry_price: price,
                stop_loss,
                take_profit,
                strategy: NAME.to_string(),
                indicators: Default::default(),
            }
        } else if price < lower {
            let (stop_loss, take_profit) = self.levels(Side::Sell, price);
            Analysis {
                action: Action::Sell,
                confidence: cfg.sell_confidence,
                reason: format!("Close below lower band {:.4}", lower),
                entry_price: price,
                stop_loss,
                take_profit,
                strategy: NAME.to_string(),
                indicators: Default::default(),
            }
        } else {
            Analysis::hold(NAME, price, "Close inside the bands", cfg.hold_confidence)
        };

        analysis
            .with_indicator("bb_upper", upper)
            .with_indicator("bb_middle", middle)
            .with_indicator("bb_lower", lower)
    }
}
