//! Public market data with graceful degradation
//!
//! `MarketService` asks the primary venue first. When the venue is
//! unavailable (network failure, 5xx, throttling, geo-block, open breaker) and
//! fallback is enabled, the answer comes from [`FallbackExchange`] instead and
//! is tagged accordingly, so API consumers can tell live data from stand-ins.
//! Rejections of the request itself (bad symbol, bad interval) propagate.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use super::error::ExchangeResult;
use super::fallback::FallbackExchange;
use super::Exchange;
use crate::{
    Candle, ConnectionReport, DataSource, ExchangeInfo, ServerTime, SymbolInfo, Ticker24h,
    TickerPrice,
};

/// A payload plus the venue that produced it
#[derive(Debug, Clone, Serialize)]
pub struct Sourced<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Sourced<T> {
    pub fn new(data: T, source: DataSource) -> Self {
        Self { data, source }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            data: f(self.data),
            source: self.source,
        }
    }
}

#[derive(Clone)]
pub struct MarketService {
    primary: Arc<dyn Exchange>,
    fallback: Option<FallbackExchange>,
}

impl MarketService {
    pub fn new(primary: Arc<dyn Exchange>, fallback_enabled: bool) -> Self {
        Self {
            primary,
            fallback: fallback_enabled.then(FallbackExchange::new),
        }
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn primary(&self) -> Arc<dyn Exchange> {
        self.primary.clone()
    }

    async fn with_fallback<'a, T, P, PF, F, FF>(
        &'a self,
        what: &str,
        primary: P,
        fallback: F,
    ) -> ExchangeResult<Sourced<T>>
    where
        P: FnOnce(&'a dyn Exchange) -> PF,
        PF: Future<Output = ExchangeResult<T>>,
        F: FnOnce(&'a FallbackExchange) -> FF,
        FF: Future<Output = ExchangeResult<T>>,
    {
        match primary(self.primary.as_ref()).await {
            Ok(data) => Ok(Sourced::new(data, self.primary.source())),
            Err(e) => match &self.fallback {
                Some(fx) if e.is_unavailable() => {
                    warn!(
                        request = what,
                        error = %e,
                        "Primary exchange failed, serving fallback data"
                    );
                    Ok(Sourced::new(fallback(fx).await?, DataSource::Fallback))
                }
                _ => Err(e),
            },
        }
    }

    pub async fn ticker_price(&self, symbol: &str) -> ExchangeResult<Sourced<TickerPrice>> {
        self.with_fallback(
            "ticker_price",
            |ex| ex.ticker_price(symbol),
            |fx| fx.ticker_price(symbol),
        )
        .await
    }

    pub async fn all_prices(&self) -> ExchangeResult<Sourced<Vec<TickerPrice>>> {
        self.with_fallback("all_prices", |ex| ex.all_prices(), |fx| fx.all_prices())
            .await
    }

    /// Prices for a chosen set of symbols, one request each
    pub async fn prices_for(
        &self,
        symbols: &[String],
    ) -> ExchangeResult<Vec<Sourced<TickerPrice>>> {
        let mut out = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            out.push(self.ticker_price(symbol).await?);
        }
        Ok(out)
    }

    pub async fn ticker_24h(&self, symbol: &str) -> ExchangeResult<Sourced<Ticker24h>> {
        self.with_fallback(
            "ticker_24h",
            |ex| ex.ticker_24h(symbol),
            |fx| fx.ticker_24h(symbol),
        )
        .await
    }

    pub async fn exchange_info(&self) -> ExchangeResult<Sourced<ExchangeInfo>> {
        self.with_fallback(
            "exchange_info",
            |ex| ex.exchange_info(),
            |fx| fx.exchange_info(),
        )
        .await
    }

    pub async fn symbol_info(&self, symbol: &str) -> ExchangeResult<Sourced<Option<SymbolInfo>>> {
        self.with_fallback(
            "symbol_info",
            |ex| ex.symbol_info(symbol),
            |fx| fx.symbol_info(symbol),
        )
        .await
    }

    pub async fn server_time(&self) -> ExchangeResult<Sourced<ServerTime>> {
        self.with_fallback("server_time", |ex| ex.server_time(), |fx| fx.server_time())
            .await
    }

    pub async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> ExchangeResult<Sourced<Vec<Candle>>> {
        self.with_fallback(
            "klines",
            |ex| ex.klines(symbol, interval, limit),
            |fx| fx.klines(symbol, interval, limit),
        )
        .await
    }

    /// Connectivity probe against the primary venue only
    pub async fn test_connection(&self) -> ExchangeResult<ConnectionReport> {
        self.primary.test_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{BinanceClient, BinanceConfig, ExchangeError};
    use std::time::Duration;

    fn unreachable_binance() -> Arc<dyn Exchange> {
        // Port 9 (discard) on localhost refuses connections immediately
        let config = BinanceConfig::mainnet()
            .with_base_url("http://127.0.0.1:9/api/v3")
            .with_max_retries(0)
            .with_timeout(Duration::from_secs(2))
            .with_min_request_interval(Duration::from_millis(1));
        Arc::new(BinanceClient::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_unreachable() {
        let market = MarketService::new(unreachable_binance(), true);
        let price = market.ticker_price("BTCUSDT").await.unwrap();
        assert_eq!(price.source, DataSource::Fallback);
        assert_eq!(price.data.price, 43250.75);
    }

    #[tokio::test]
    async fn test_propagates_when_fallback_disabled() {
        let market = MarketService::new(unreachable_binance(), false);
        let result = market.server_time().await;
        assert!(matches!(result, Err(ExchangeError::Network(_))));
    }

    #[tokio::test]
    async fn test_primary_source_reported() {
        let market = MarketService::new(Arc::new(FallbackExchange::new()), true);
        let candles = market.klines("BTCUSDT", "1h", 10).await.unwrap();
        assert_eq!(candles.source, DataSource::Fallback);
        assert_eq!(candles.data.len(), 10);
    }

    #[tokio::test]
    async fn test_fallback_errors_still_surface() {
        let market = MarketService::new(unreachable_binance(), true);
        // invalid interval fails locally on both venues
        assert!(market.klines("BTCUSDT", "2m", 10).await.is_err());
    }
}
