//! Mean Reversion Strategy
//!
//! ## Strategy Logic
//! - RSI below the oversold threshold: BUY
//! - RSI above the overbought threshold: SELL
//! - Anything in between: HOLD

use crate::indicators::{closes, last_value, rsi};
use crate::strategies::Strategy;
use crate::{Action, Analysis, Candle};

use super::config::MeanReversionConfig;

const NAME: &str = "mean_reversion";

pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
}

impl MeanReversionStrategy {
    pub fn new(config: MeanReversionConfig) -> Self {
        MeanReversionStrategy { config }
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Buys oversold and sells overbought RSI readings"
    }

    fn min_candles(&self) -> usize {
        self.config.rsi_period + 1
    }

    fn analyze(&self, candles: &[Candle]) -> Analysis {
        let price = candles.last().map(|c| c.close).unwrap_or(0.0);
        if candles.len() < self.min_candles() {
            return Analysis::insufficient_data(NAME, price);
        }

        let Some(current_rsi) = last_value(&rsi(&closes(candles), self.config.rsi_period)) else {
            return Analysis::insufficient_data(NAME, price);
        };

        let cfg = &self.config;
        let (action, confidence, reason) = if current_rsi < cfg.rsi_oversold {
            (
                Action::Buy,
                cfg.buy_confidence,
                format!("RSI {:.1} oversold (< {})", current_rsi, cfg.rsi_oversold),
            )
        } else if current_rsi > cfg.rsi_overbought {
            (
                Action::Sell,
                cfg.sell_confidence,
                format!("RSI {:.1} overbought (> {})", current_rsi, cfg.rsi_overbought),
            )
        } else {
            (
                Action::Hold,
                cfg.hold_confidence,
                format!("RSI {:.1} in neutral zone", current_rsi),
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
        .with_indicator("rsi", current_rsi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{candles_from_closes, linear};
    use approx::assert_relative_eq;

    fn strategy() -> MeanReversionStrategy {
        MeanReversionStrategy::new(MeanReversionConfig::default())
    }

    #[test]
    fn test_sell_off_is_oversold() {
        let candles = candles_from_closes(&linear(150.0, -1.0, 40));
        let a = strategy().analyze(&candles);
        assert_eq!(a.action, Action::Buy);
        assert_relative_eq!(a.confidence, 0.75);
        assert_relative_eq!(a.stop_loss, a.entry_price * 0.97, epsilon = 1e-9);
        assert_relative_eq!(a.take_profit, a.entry_price * 1.03, epsilon = 1e-9);
    }

    #[test]
    fn test_rally_is_overbought() {
        let candles = candles_from_closes(&linear(100.0, 1.0, 40));
        let a = strategy().analyze(&candles);
        assert_eq!(a.action, Action::Sell);
        assert_relative_eq!(a.confidence, 0.65);
    }

    #[test]
    fn test_choppy_market_holds() {
        let closes: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let a = strategy().analyze(&candles_from_closes(&closes));
        assert_eq!(a.action, Action::Hold);
        assert!(a.indicators["rsi"] > 30.0 && a.indicators["rsi"] < 70.0);
    }

    #[test]
    fn test_short_decline_after_chop_is_not_oversold() {
        let mut closes: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 100.0 } else { 102.0 })
            .collect();
        for _ in 0..5 {
            closes.push(closes[closes.len() - 1] - 2.0);
        }
        let a = strategy().analyze(&candles_from_closes(&closes));
        assert_eq!(a.action, Action::Hold);
        assert_relative_eq!(a.indicators["rsi"], 33.286801, epsilon = 1e-6);
    }

    #[test]
    fn test_insufficient_data() {
        let a = strategy().analyze(&candles_from_closes(&[100.0; 5]));
        assert_eq!(a.reason, "insufficient data");
    }
}
