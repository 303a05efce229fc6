//! Paper trading venue
//!
//! Wraps a market data source and fills market orders at its current price
//! against an in-memory account. Shorts are allowed: selling more base asset
//! than held leaves a negative balance.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{ExchangeError, ExchangeResult};
use super::Exchange;
use crate::{
    split_symbol, Balance, Candle, DataSource, ExchangeInfo, OrderAck, ServerTime, Side,
    SymbolInfo, Ticker24h, TickerPrice,
};

/// Taker fee applied to simulated fills (0.1%)
pub const DEFAULT_FEE_RATE: f64 = 0.001;

pub struct PaperExchange {
    feed: Arc<dyn Exchange>,
    balances: Mutex<BTreeMap<String, f64>>,
    fee_rate: f64,
    next_id: AtomicU64,
}

impl PaperExchange {
    pub fn new(feed: Arc<dyn Exchange>, quote_asset: &str, starting_balance: f64) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(quote_asset.to_string(), starting_balance);
        Self {
            feed,
            balances: Mutex::new(balances),
            fee_rate: DEFAULT_FEE_RATE,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate.max(0.0);
        self
    }

    fn accounts(&self) -> MutexGuard<'_, BTreeMap<String, f64>> {
        self.balances.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current simulated balance of one asset
    pub fn balance_of(&self, asset: &str) -> f64 {
        self.accounts().get(asset).copied().unwrap_or(0.0)
    }

    fn settle(&self, symbol: &str, side: Side, quantity: f64, price: f64) -> ExchangeResult<()> {
        let (base, quote) = split_symbol(symbol)
            .ok_or_else(|| ExchangeError::InvalidRequest(format!("unknown pair '{}'", symbol)))?;

        let mut accounts = self.accounts();
        let notional = quantity * price;

        match side {
            Side::Buy => {
                let cost = notional * (1.0 + self.fee_rate);
                let available = accounts.get(quote).copied().unwrap_or(0.0);
                if available + 1e-12 < cost {
                    return Err(ExchangeError::InsufficientBalance {
                        asset: quote.to_string(),
                        needed: cost,
                        available,
                    });
                }
                *accounts.entry(quote.to_string()).or_insert(0.0) -= cost;
                *accounts.entry(base.to_string()).or_insert(0.0) += quantity;
            }
            Side::Sell => {
                let proceeds = notional * (1.0 - self.fee_rate);
                *accounts.entry(base.to_string()).or_insert(0.0) -= quantity;
                *accounts.entry(quote.to_string()).or_insert(0.0) += proceeds;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn source(&self) -> DataSource {
        DataSource::Paper
    }

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<TickerPrice> {
        self.feed.ticker_price(symbol).await
    }

    async fn all_prices(&self) -> ExchangeResult<Vec<TickerPrice>> {
        self.feed.all_prices().await
    }

    async fn ticker_24h(&self, symbol: &str) -> ExchangeResult<Ticker24h> {
        self.feed.ticker_24h(symbol).await
    }

    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        self.feed.exchange_info().await
    }

    async fn symbol_info(&self, symbol: &str) -> ExchangeResult<Option<SymbolInfo>> {
        self.feed.symbol_info(symbol).await
    }

    async fn server_time(&self) -> ExchangeResult<ServerTime> {
        self.feed.server_time().await
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        self.feed.klines(symbol, interval, limit).await
    }

    async fn balances(&self) -> ExchangeResult<Vec<Balance>> {
        Ok(self
            .accounts()
            .iter()
            .filter(|(_, amount)| amount.abs() > 1e-12)
            .map(|(asset, amount)| Balance {
                asset: asset.clone(),
                free: *amount,
                locked: 0.0,
            })
            .collect())
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> ExchangeResult<OrderAck> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ExchangeError::InvalidRequest(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        let price = self.feed.ticker_price(symbol).await?.price;
        self.settle(symbol, side, quantity, price)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(symbol, side = %side, quantity, price, "Paper order filled");

        Ok(OrderAck {
            order_id: format!("PAPER-{}", id),
            symbol: symbol.to_string(),
            side,
            status: "FILLED".to_string(),
            executed_qty: quantity,
            avg_price: price,
            transact_time: Utc::now().timestamp_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::FallbackExchange;
    use approx::assert_relative_eq;

    fn paper(balance: f64) -> PaperExchange {
        PaperExchange::new(Arc::new(FallbackExchange::new()), "USDT", balance).with_fee_rate(0.0)
    }

    #[tokio::test]
    async fn test_buy_moves_quote_into_base() {
        let ex = paper(10_000.0);
        let ack = ex.place_market_order("ETHUSDT", Side::Buy, 2.0).await.unwrap();
        assert_eq!(ack.status, "FILLED");
        assert_relative_eq!(ack.avg_price, 2580.40);
        assert_relative_eq!(ex.balance_of("ETH"), 2.0);
        assert_relative_eq!(ex.balance_of("USDT"), 10_000.0 - 5160.80, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_buy_beyond_balance_rejected() {
        let ex = paper(100.0);
        let result = ex.place_market_order("BTCUSDT", Side::Buy, 1.0).await;
        assert!(matches!(
            result,
            Err(ExchangeError::InsufficientBalance { .. })
        ));
        assert_relative_eq!(ex.balance_of("USDT"), 100.0);
    }

    #[tokio::test]
    async fn test_sell_can_open_short() {
        let ex = paper(0.0);
        ex.place_market_order("BNBUSDT", Side::Sell, 1.0).await.unwrap();
        assert_relative_eq!(ex.balance_of("BNB"), -1.0);
        assert_relative_eq!(ex.balance_of("USDT"), 315.20, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_fee_and_order_ids() {
        let ex = PaperExchange::new(Arc::new(FallbackExchange::new()), "USDT", 1_000.0);
        let a = ex.place_market_order("DOTUSDT", Side::Buy, 10.0).await.unwrap();
        let b = ex.place_market_order("DOTUSDT", Side::Sell, 10.0).await.unwrap();
        assert_ne!(a.order_id, b.order_id);
        // round trip loses two fees
        assert!(ex.balance_of("USDT") < 1_000.0);
        assert!(ex.balances().await.unwrap().iter().all(|b| b.asset != "DOT"));
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let ex = paper(1_000.0);
        assert!(ex.place_market_order("BTCUSDT", Side::Buy, 0.0).await.is_err());
        assert!(ex.place_market_order("XYZ", Side::Buy, 1.0).await.is_err());
    }
}
