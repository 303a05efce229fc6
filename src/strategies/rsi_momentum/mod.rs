//! RSI Momentum Strategy
//!
//! Compares RSI with its own short moving average (the "signal"). Momentum
//! turning up from a non-overbought level is bought; momentum rolling over
//! from a non-oversold level is sold.

mod config;
mod strategy;

pub use config::RsiMomentumConfig;
pub use strategy::RsiMomentumStrategy;

use super::{parse_params, Strategy};
use anyhow::Result;

/// Registry factory
pub fn create(params: &serde_json::Value) -> Result<Box<dyn Strategy>> {
    let config: RsiMomentumConfig = parse_params(params)?;
    Ok(Box::new(RsiMomentumStrategy::new(config)))
}
