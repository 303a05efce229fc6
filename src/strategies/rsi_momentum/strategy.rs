use crate::indicators::{closes, mean, rsi};
use crate::strategies::Strategy;
use crate::{Action, Analysis, Candle};

use super::config::RsiMomentumConfig;

const NAME: &str = "rsi_momentum";

pub struct RsiMomentumStrategy {
    config: RsiMomentumConfig,
}

impl RsiMomentumStrategy {
    pub fn new(config: RsiMomentumConfig) -> Self {
        RsiMomentumStrategy { config }
    }

    /// (current RSI, mean of the last `signal_period` RSI values)
    fn rsi_and_signal(&self, candles: &[Candle]) -> Option<(f64, f64)> {
        let series = rsi(&closes(candles), self.config.rsi_period);
        let tail = series.get(series.len().checked_sub(self.config.signal_period.max(1))?..)?;
        let values: Option<Vec<f64>> = tail.iter().copied().collect();
        let values = values?;
        Some((*values.last()?, mean(&values)?))
    }
}

impl Strategy for RsiMomentumStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Trades RSI crossing its short signal average"
    }

    fn min_candles(&self) -> usize {
        self.config.rsi_period + self.config.signal_period.max(1) - 1
    }

    fn analyze(&self, candles: &[Candle]) -> Analysis {
        let price = candles.last().map(|c| c.close).unwrap_or(0.0);
        if candles.len() < self.min_candles() {
            return Analysis::insufficient_data(NAME, price);
        }
        let Some((current, signal)) = self.rsi_and_signal(candles) else {
            return Analysis::insufficient_data(NAME, price);
        };

        let cfg = &self.config;
        let (action, confidence, reason) = if current > signal && current < cfg.buy_ceiling {
            (
                Action::Buy,
                cfg.buy_confidence,
                format!("RSI {:.1} rising above signal {:.1}", current, signal),
            )
        } else if current < signal && current > cfg.sell_floor {
            (
                Action::Sell,
                cfg.sell_confidence,
                format!("RSI {:.1} falling below signal {:.1}", current, signal),
            )
        } else {
            (Action::Hold, cfg.hold_confidence, "No momentum shift".to_string())
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
        .with_indicator("rsi", current)
        .with_indicator("rsi_signal", signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{candles_from_closes, linear};

    fn strategy() -> RsiMomentumStrategy {
        RsiMomentumStrategy::new(RsiMomentumConfig::default())
    }

    #[test]
    fn test_bounce_after_selloff_buys() {
        let mut closes = linear(150.0, -1.0, 30);
        closes.push(121.0 + 1.0);
        let a = strategy().analyze(&candles_from_closes(&closes));
        assert_eq!(a.action, Action::Buy);
        assert!(a.indicators["rsi"] < 60.0);
    }

    #[test]
    fn test_pullback_after_rally_sells() {
        let mut closes = linear(100.0, 1.0, 30);
        closes.push(129.0 - 1.0);
        let a = strategy().analyze(&candles_from_closes(&closes));
        assert_eq!(a.action, Action::Sell);
        assert!(a.indicators["rsi"] > 40.0);
    }

    #[test]
    fn test_persistent_rally_holds() {
        let a = strategy().analyze(&candles_from_closes(&linear(100.0, 1.0, 30)));
        assert_eq!(a.action, Action::Hold);
    }

    #[test]
    fn test_min_candles() {
        assert_eq!(strategy().min_candles(), 16);
        let a = strategy().analyze(&candles_from_closes(&linear(100.0, 1.0, 15)));
        assert_eq!(a.reason, "insufficient data");
    }
}
