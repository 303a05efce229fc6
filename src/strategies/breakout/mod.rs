//! Channel Breakout Strategy
//!
//! Trades a close through the highest high (resistance) or lowest low
//! (support) of the preceding lookback window. The current bar is excluded
//! from the channel so that a breakout is measured against prior structure.

mod config;
mod strategy;

pub use config::BreakoutConfig;
pub use strategy::BreakoutStrategy;

use super::{parse_params, Strategy};
use anyhow::Result;

/// Registry factory
pub fn create(params: &serde_json::Value) -> Result<Box<dyn Strategy>> {
    let config: BreakoutConfig = parse_params(params)?;
    Ok(Box::new(BreakoutStrategy::new(config)))
}
