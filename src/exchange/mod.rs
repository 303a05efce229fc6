//! Exchange access
//!
//! The [`Exchange`] trait is the seam between the trading logic and a venue.
//! Implementations:
//! - [`BinanceClient`]: Binance Spot REST (public + signed endpoints)
//! - [`FallbackExchange`]: deterministic offline data
//! - [`PaperExchange`]: simulated fills on top of any market data source
//!
//! [`MarketService`] layers fallback on top of a primary venue for public
//! data, and [`ExchangeConnector`] hands out per-user trading accounts.

pub mod auth;
pub mod binance;
pub mod connector;
pub mod error;
pub mod fallback;
pub mod market;
pub mod paper;
pub mod wire;

pub use auth::Credentials;
pub use binance::{BinanceClient, BinanceConfig};
pub use connector::{BinanceConnector, ExchangeConnector, OfflineConnector};
pub use error::{ExchangeError, ExchangeResult};
pub use fallback::FallbackExchange;
pub use market::{MarketService, Sourced};
pub use paper::PaperExchange;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    Balance, Candle, ConnectionReport, DataSource, ExchangeInfo, OrderAck, ServerTime, Side,
    SymbolInfo, Ticker24h, TickerPrice,
};

#[async_trait]
pub trait Exchange: Send + Sync {
    /// Which venue answers these calls
    fn source(&self) -> DataSource;

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<TickerPrice>;

    async fn all_prices(&self) -> ExchangeResult<Vec<TickerPrice>>;

    async fn ticker_24h(&self, symbol: &str) -> ExchangeResult<Ticker24h>;

    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo>;

    /// Trading rules for one pair, `None` if the venue does not list it
    async fn symbol_info(&self, symbol: &str) -> ExchangeResult<Option<SymbolInfo>> {
        let info = self.exchange_info().await?;
        Ok(info.symbols.into_iter().find(|s| s.symbol == symbol))
    }

    async fn server_time(&self) -> ExchangeResult<ServerTime>;

    /// Most recent `limit` candles, oldest first
    async fn klines(&self, symbol: &str, interval: &str, limit: u32) -> ExchangeResult<Vec<Candle>>;

    /// Non-zero balances of the account behind this handle
    async fn balances(&self) -> ExchangeResult<Vec<Balance>>;

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> ExchangeResult<OrderAck>;

    async fn test_connection(&self) -> ExchangeResult<ConnectionReport> {
        let started = Utc::now().timestamp_millis();
        let server = self.server_time().await?;
        let local_time = Utc::now().timestamp_millis();
        Ok(ConnectionReport {
            status: "connected".to_string(),
            server_time: server.server_time,
            local_time,
            latency_ms: local_time - started,
        })
    }
}
