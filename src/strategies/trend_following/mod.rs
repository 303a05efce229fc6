//! Trend Following Strategy
//!
//! Rides established trends using the relationship between a fast and a slow
//! simple moving average.
//!
//! ## Entry Logic
//! - BUY: fast SMA above slow SMA and price above the fast SMA
//! - SELL: fast SMA below slow SMA and price below the fast SMA
//!
//! ## Levels
//! Stop loss and take profit are fixed fractions of the entry price
//! (default -2% / +4%).

mod config;
mod strategy;

pub use config::TrendFollowingConfig;
pub use strategy::TrendFollowingStrategy;

use super::{parse_params, Strategy};
use anyhow::Result;

/// Registry factory
pub fn create(params: &serde_json::Value) -> Result<Box<dyn Strategy>> {
    let config: TrendFollowingConfig = parse_params(params)?;
    Ok(Box::new(TrendFollowingStrategy::new(config)))
}
