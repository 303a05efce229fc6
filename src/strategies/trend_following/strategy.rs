use crate::indicators::{closes, last_value, sma};
use crate::strategies::Strategy;
use crate::{Action, Analysis, Candle};

use super::config::TrendFollowingConfig;

const NAME: &str = "trend_following";

pub struct TrendFollowingStrategy {
    config: TrendFollowingConfig,
}

impl TrendFollowingStrategy {
    pub fn new(config: TrendFollowingConfig) -> Self {
        TrendFollowingStrategy { config }
    }
}

impl Strategy for TrendFollowingStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Follows the trend using fast/slow moving average alignment"
    }

    fn min_candles(&self) -> usize {
        self.config.fast_period.max(self.config.slow_period)
    }

    fn analyze(&self, candles: &[Candle]) -> Analysis {
        let price = candles.last().map(|c| c.close).unwrap_or(0.0);
        if candles.len() < self.min_candles() {
            return Analysis::insufficient_data(NAME, price);
        }

        let close = closes(candles);
        let (Some(fast), Some(slow)) = (
            last_value(&sma(&close, self.config.fast_period)),
            last_value(&sma(&close, self.config.slow_period)),
        ) else {
            return Analysis::insufficient_data(NAME, price);
        };

        let cfg = &self.config;
        let (action, confidence, reason) = if fast > slow && price > fast {
            (
                Action::Buy,
                cfg.buy_confidence,
                format!(
                    "Uptrend: SMA{} above SMA{} and price above SMA{}",
                    cfg.fast_period, cfg.slow_period, cfg.fast_period
                ),
            )
        } else if fast < slow && price < fast {
            (
                Action::Sell,
                cfg.sell_confidence,
                format!(
                    "Downtrend: SMA{} below SMA{} and price below SMA{}",
                    cfg.fast_period, cfg.slow_period, cfg.fast_period
                ),
            )
        } else {
            (Action::Hold, cfg.hold_confidence, "No clear trend".to_string())
        };

        Analysis {
            action,
            confidence,
            reason,
            entry_price: price,
            stop_loss: price * cfg.stop_loss_factor,
            take_profit: price * cfg.take_profit_factor,
            strategy: NAME.to_string(),
            indicators: Default::default(),
        }
        .with_indicator("sma_fast", fast)
        .with_indicator("sma_slow", slow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{candles_from_closes, linear};
    use approx::assert_relative_eq;

    fn strategy() -> TrendFollowingStrategy {
        TrendFollowingStrategy::new(TrendFollowingConfig::default())
    }

    #[test]
    fn test_uptrend_buys() {
        let candles = candles_from_closes(&linear(100.0, 1.0, 60));
        let a = strategy().analyze(&candles);
        assert_eq!(a.action, Action::Buy);
        assert_relative_eq!(a.confidence, 0.8);
        assert_relative_eq!(a.stop_loss, 159.0 * 0.98, epsilon = 1e-9);
        assert_relative_eq!(a.take_profit, 159.0 * 1.04, epsilon = 1e-9);
        assert!(a.indicators.contains_key("sma_fast"));
    }

    #[test]
    fn test_downtrend_sells() {
        let candles = candles_from_closes(&linear(200.0, -1.0, 60));
        let a = strategy().analyze(&candles);
        assert_eq!(a.action, Action::Sell);
        assert_relative_eq!(a.confidence, 0.7);
    }

    #[test]
    fn test_flat_market_holds() {
        let candles = candles_from_closes(&vec![100.0; 60]);
        let a = strategy().analyze(&candles);
        assert_eq!(a.action, Action::Hold);
        assert_relative_eq!(a.confidence, 0.5);
    }

    #[test]
    fn test_insufficient_data() {
        let candles = candles_from_closes(&linear(100.0, 1.0, 30));
        let a = strategy().analyze(&candles);
        assert_eq!(a.action, Action::Hold);
        assert_eq!(a.reason, "insufficient data");
    }
}
