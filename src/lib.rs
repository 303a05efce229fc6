//! DeepSignal
//!
//! Backend for a crypto signal and auto-trading service: user accounts with
//! JWT auth, encrypted exchange keys, Binance market data with offline
//! fallback, indicator strategies, per-user trading bots and a trade journal.

pub mod api;
pub mod auth;
pub mod bot;
pub mod common;
pub mod config;
pub mod exchange;
pub mod indicators;
pub mod store;
pub mod strategies;
pub mod types;
pub mod vault;

pub use config::AppConfig;
pub use types::*;
