//! Trading Strategies Module
//!
//! Indicator driven strategies that turn a candle window into a BUY/SELL/HOLD
//! [`Analysis`] with confidence, stop-loss and take-profit levels.
//!
//! - Clean trait interface that all strategies implement
//! - Dynamic strategy registry (no hardcoded names at call sites)
//! - Per-strategy configs with serde defaults, overridable from JSON

pub mod bollinger_breakout;
pub mod breakout;
pub mod mean_reversion;
pub mod rsi_momentum;
pub mod sma_crossover;
pub mod trend_following;

use crate::{Analysis, Candle};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

// =============================================================================
// Strategy Trait - The contract all strategies must implement
// =============================================================================

/// Trading strategy trait.
///
/// Strategies are stateless with respect to positions: the trading loop owns
/// position bookkeeping and only asks for a verdict on the latest window.
pub trait Strategy: Send + Sync {
    /// Registry identifier
    fn name(&self) -> &'static str;

    /// One line human readable summary
    fn description(&self) -> &'static str;

    /// Minimum number of candles required before the strategy emits anything but HOLD
    fn min_candles(&self) -> usize;

    /// Evaluate the candle window (oldest first). The last candle is the current bar.
    fn analyze(&self, candles: &[Candle]) -> Analysis;
}

/// Registry listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub name: String,
    pub description: String,
}

// =============================================================================
// Strategy Factory - Type alias for strategy constructor functions
// =============================================================================

/// Factory function type: builds a strategy from JSON params (`null` = defaults)
pub type StrategyFactory = fn(&serde_json::Value) -> Result<Box<dyn Strategy>>;

/// Deserialize a strategy config, treating `null` as "all defaults"
pub(crate) fn parse_params<T>(params: &serde_json::Value) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).context("Invalid strategy parameters")
}

// =============================================================================
// Strategy Registry - Dynamic registration without hardcoding
// =============================================================================

static REGISTRY: OnceLock<RwLock<HashMap<&'static str, StrategyFactory>>> = OnceLock::new();

fn get_registry() -> &'static RwLock<HashMap<&'static str, StrategyFactory>> {
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("trend_following", trend_following::create as StrategyFactory);
        map.insert("mean_reversion", mean_reversion::create as StrategyFactory);
        map.insert("breakout", breakout::create as StrategyFactory);
        map.insert("rsi_momentum", rsi_momentum::create as StrategyFactory);
        map.insert("sma_crossover", sma_crossover::create as StrategyFactory);
        map.insert(
            "bollinger_breakout",
            bollinger_breakout::create as StrategyFactory,
        );
        RwLock::new(map)
    })
}

fn lookup(name: &str) -> Result<StrategyFactory> {
    let registry = get_registry()
        .read()
        .map_err(|_| anyhow::anyhow!("Strategy registry lock poisoned"))?;

    registry.get(name).copied().ok_or_else(|| {
        let mut available: Vec<_> = registry.keys().copied().collect();
        available.sort_unstable();
        anyhow::anyhow!(
            "Unknown strategy: '{}'. Available: {}",
            name,
            available.join(", ")
        )
    })
}

/// Create a strategy with its default parameters
pub fn create_strategy(name: &str) -> Result<Box<dyn Strategy>> {
    create_strategy_with(name, &serde_json::Value::Null)
}

/// Create a strategy with JSON parameter overrides
pub fn create_strategy_with(name: &str, params: &serde_json::Value) -> Result<Box<dyn Strategy>> {
    let factory = lookup(name)?;
    factory(params)
}

/// Whether a strategy name is registered
pub fn is_registered(name: &str) -> bool {
    lookup(name).is_ok()
}

/// Registered strategies with their descriptions, sorted by name
pub fn available_strategies() -> Vec<StrategyInfo> {
    let factories: Vec<(&'static str, StrategyFactory)> = match get_registry().read() {
        Ok(registry) => registry.iter().map(|(k, v)| (*k, *v)).collect(),
        Err(_) => return vec![],
    };

    let mut infos: Vec<StrategyInfo> = factories
        .into_iter()
        .filter_map(|(name, factory)| {
            factory(&serde_json::Value::Null)
                .ok()
                .map(|s| StrategyInfo {
                    name: name.to_string(),
                    description: s.description().to_string(),
                })
        })
        .collect();
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    infos
}

/// Register a new strategy (for plugins or testing)
pub fn register_strategy(name: &'static str, factory: StrategyFactory) {
    if let Ok(mut registry) = get_registry().write() {
        registry.insert(name, factory);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::Candle;
    use chrono::{Duration, TimeZone, Utc};

    /// Candles whose OHLC all sit on the given closes (high/low +-0.1%)
    pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Candle::new_unchecked(
                    start + Duration::minutes(15 * i as i64),
                    c,
                    c * 1.001,
                    c * 0.999,
                    c,
                    1000.0,
                )
            })
            .collect()
    }

    pub fn linear(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }
}
