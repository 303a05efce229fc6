//! Auto trading
//!
//! An [`AutoTrader`] runs one polling cycle at a time: fetch candles, manage the
//! open position, ask the strategy for a verdict and place market orders.
//! [`BotManager`] owns one background loop per user.

mod manager;
mod trader;
mod types;

pub use manager::BotManager;
pub use trader::{AutoTrader, CycleOutcome, JournalSink};
pub use types::{BotPosition, BotSettings, BotStatus, TradeKind, TradeLogEntry, TradingStats};

use crate::exchange::ExchangeError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Auto trading is already running")]
    AlreadyRunning,

    #[error("Auto trading is not running")]
    NotRunning,

    #[error("{0}")]
    UnknownStrategy(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
