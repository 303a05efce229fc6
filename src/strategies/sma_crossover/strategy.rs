use crate::indicators::{closes, last_value, sma};
use crate::strategies::Strategy;
use crate::{Action, Analysis, Candle};

use super::config::SmaCrossoverConfig;

const NAME: &str = "sma_crossover";

pub struct SmaCrossoverStrategy {
    config: SmaCrossoverConfig,
}

impl SmaCrossoverStrategy {
    pub fn new(config: SmaCrossoverConfig) -> Self {
        SmaCrossoverStrategy { config }
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Short/long simple moving average crossover with a tolerance band"
    }

    fn min_candles(&self) -> usize {
        self.config.short_period.max(self.config.long_period)
    }

    fn analyze(&self, candles: &[Candle]) -> Analysis {
        let price = candles.last().map(|c| c.close).unwrap_or(0.0);
        if candles.len() < self.min_candles() {
            return Analysis::insufficient_data(NAME, price);
        }

        let close = closes(candles);
        let (Some(short), Some(long)) = (
            last_value(&sma(&close, self.config.short_period)),
            last_value(&sma(&close, self.config.long_period)),
        ) else {
            return Analysis::insufficient_data(NAME, price);
        };

        let cfg = &self.config;
        let analysis = if short > long * (1.0 + cfg.band) {
            Analysis {
                action: Action::Buy,
                confidence: cfg.buy_confidence,
                reason: format!("Short SMA {:.4} above long SMA {:.4}", short, long),
                entry_price: price,
                stop_loss: price * (1.0 - cfg.stop_pct),
                take_profit: price * (1.0 + cfg.target_pct),
                strategy: NAME.to_string(),
                indicators: Default::default(),
            }
        } else if short < long * (1.0 - cfg.band) {
            Analysis {
                action: Action::Sell,
                confidence: cfg.sell_confidence,
                reason: format!("Short SMA {:.4} below long SMA {:.4}", short, long),
                entry_price: price,
                stop_loss: price * (1.0 + cfg.stop_pct),
                take_profit: price * (1.0 - cfg.target_pct),
                strategy: NAME.to_string(),
                indicators: Default::default(),
            }
        } else {
            Analysis::hold(NAME, price, "Averages within band", cfg.hold_confidence)
        };

        analysis
            .with_indicator("sma_short", short)
            .with_indicator("sma_long", long)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{candles_from_closes, linear};
    use approx::assert_relative_eq;

    fn strategy() -> SmaCrossoverStrategy {
        SmaCrossoverStrategy::new(SmaCrossoverConfig::default())
    }

    #[test]
    fn test_rising_market_buys_with_wide_target() {
        let a = strategy().analyze(&candles_from_closes(&linear(100.0, 1.0, 25)));
        assert_eq!(a.action, Action::Buy);
        assert_relative_eq!(a.stop_loss, 124.0 * 0.98, epsilon = 1e-9);
        assert_relative_eq!(a.take_profit, 124.0 * 1.06, epsilon = 1e-9);
    }

    #[test]
    fn test_falling_market_sells_with_mirrored_levels() {
        let a = strategy().analyze(&candles_from_closes(&linear(200.0, -1.0, 25)));
        assert_eq!(a.action, Action::Sell);
        assert_relative_eq!(a.confidence, 0.6);
        assert!(a.stop_loss > a.entry_price);
        assert!(a.take_profit < a.entry_price);
    }

    #[test]
    fn test_within_band_holds() {
        let a = strategy().analyze(&candles_from_closes(&[100.0; 25]));
        assert_eq!(a.action, Action::Hold);
        assert_relative_eq!(a.confidence, 0.5);
    }

    #[test]
    fn test_fewer_than_long_period_is_insufficient() {
        let a = strategy().analyze(&candles_from_closes(&linear(100.0, 1.0, 19)));
        assert_eq!(a.action, Action::Hold);
        assert_eq!(a.reason, "insufficient data");
    }
}
