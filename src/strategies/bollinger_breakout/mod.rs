//! Bollinger Breakout Strategy
//!
//! Treats a close outside the Bollinger envelope as a volatility breakout in
//! the direction of the move.

mod config;
mod strategy;

pub use config::BollingerBreakoutConfig;
pub use strategy::BollingerBreakoutStrategy;

use super::{parse_params, Strategy};
use anyhow::Result;

/// Registry factory
pub fn create(params: &serde_json::Value) -> Result<Box<dyn Strategy>> {
    let config: BollingerBreakoutConfig = parse_params(params)?;
    Ok(Box::new(BollingerBreakoutStrategy::new(config)))
}
