//! Mean Reversion Strategy
//!
//! Fades stretched moves: an oversold RSI is a buying opportunity, an
//! overbought RSI a selling one.

mod config;
mod strategy;

pub use config::MeanReversionConfig;
pub use strategy::MeanReversionStrategy;

use super::{parse_params, Strategy};
use anyhow::Result;

/// Registry factory
pub fn create(params: &serde_json::Value) -> Result<Box<dyn Strategy>> {
    let config: MeanReversionConfig = parse_params(params)?;
    Ok(Box::new(MeanReversionStrategy::new(config)))
}
