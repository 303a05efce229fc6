//! SMA Crossover Strategy
//!
//! The simplest strategy in the registry: a short SMA pulling more than a
//! tolerance band away from a long SMA. Levels are mirrored for shorts.

mod config;
mod strategy;

pub use config::SmaCrossoverConfig;
pub use strategy::SmaCrossoverStrategy;

use super::{parse_params, Strategy};
use anyhow::Result;

/// Registry factory
pub fn create(params: &serde_json::Value) -> Result<Box<dyn Strategy>> {
    let config: SmaCrossoverConfig = parse_params(params)?;
    Ok(Box::new(SmaCrossoverStrategy::new(config)))
}
