use crate::indicators::{rolling_max, rolling_min, value_back};
use crate::strategies::Strategy;
use crate::{Action, Analysis, Candle};

use super::config::BreakoutConfig;

const NAME: &str = "breakout";

pub struct BreakoutStrategy {
    config: BreakoutConfig,
}

impl BreakoutStrategy {
    pub fn new(config: BreakoutConfig) -> Self {
        BreakoutStrategy { config }
    }

    /// (support, resistance) of the window that ends one bar before the current one
    fn channel(&self, candles: &[Candle]) -> Option<(f64, f64)> {
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let resistance = value_back(&rolling_max(&highs, self.config.lookback), 1)?;
        let support = value_back(&rolling_min(&lows, self.config.lookback), 1)?;
        Some((support, resistance))
    }
}

impl Strategy for BreakoutStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Trades closes beyond the recent support/resistance channel"
    }

    fn min_candles(&self) -> usize {
        self.config.lookback + 1
    }

    fn analyze(&self, candles: &[Candle]) -> Analysis {
        let price = candles.last().map(|c| c.close).unwrap_or(0.0);
        if candles.len() < self.min_candles() {
            return Analysis::insufficient_data(NAME, price);
        }
        let Some((support, resistance)) = self.channel(candles) else {
            return Analysis::insufficient_data(NAME, price);
        };

        let cfg = &self.config;
        let (action, confidence, reason) = if price > resistance {
            (
                Action::Buy,
                cfg.buy_confidence,
                format!("Breakout above resistance {:.4}", resistance),
            )
        } else if price < support {
            (
                Action::Sell,
                cfg.sell_confidence,
                format!("Breakdown below support {:.4}", support),
            )
        } else {
            (
                Action::Hold,
                cfg.hold_confidence,
                "Price inside support/resistance channel".to_string(),
            )
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
        .with_indicator("resistance", resistance)
        .with_indicator("support", support)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::candles_from_closes;
    use approx::assert_relative_eq;

    fn strategy() -> BreakoutStrategy {
        BreakoutStrategy::new(BreakoutConfig::default())
    }

    fn range_then(last: f64) -> Vec<Candle> {
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        closes.push(last);
        candles_from_closes(&closes)
    }

    #[test]
    fn test_breakout_above_range() {
        let a = strategy().analyze(&range_then(110.0));
        assert_eq!(a.action, Action::Buy);
        assert_relative_eq!(a.confidence, 0.7);
        assert_relative_eq!(a.take_profit, 110.0 * 1.05, epsilon = 1e-9);
        // resistance comes from prior bars only: max close 104 * 1.001
        assert_relative_eq!(a.indicators["resistance"], 104.0 * 1.001, epsilon = 1e-9);
    }

    #[test]
    fn test_breakdown_below_range() {
        let a = strategy().analyze(&range_then(90.0));
        assert_eq!(a.action, Action::Sell);
        assert_relative_eq!(a.confidence, 0.6);
    }

    #[test]
    fn test_inside_range_holds() {
        let a = strategy().analyze(&range_then(102.0));
        assert_eq!(a.action, Action::Hold);
    }

    #[test]
    fn test_needs_lookback_plus_one() {
        let candles = candles_from_closes(&[100.0; 20]);
        assert_eq!(strategy().analyze(&candles).reason, "insufficient data");
    }
}
