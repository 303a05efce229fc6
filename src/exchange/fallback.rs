//! Deterministic offline market data
//!
//! Used when Binance is unreachable (or the server runs offline) so that the
//! dashboard and strategy endpoints keep answering with plausible numbers.
//! Everything here is a pure function of the symbol and the clock; orders are
//! refused.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::error::{ExchangeError, ExchangeResult};
use super::wire::{interval_millis, is_valid_interval};
use super::Exchange;
use crate::{
    split_symbol, Balance, Candle, DataSource, ExchangeInfo, OrderAck, ServerTime, Side,
    SymbolInfo, Ticker24h, TickerPrice,
};

/// Reference prices served for well-known pairs
pub const FALLBACK_PRICES: &[(&str, f64)] = &[
    ("BTCUSDT", 43250.75),
    ("ETHUSDT", 2580.40),
    ("BNBUSDT", 315.20),
    ("ADAUSDT", 0.52),
    ("DOTUSDT", 7.15),
];

/// Price reported for any pair not listed above
pub const DEFAULT_FALLBACK_PRICE: f64 = 100.0;

/// Demo balances reported by the offline account
pub const FALLBACK_BALANCES: &[(&str, f64)] = &[("BTC", 0.125), ("ETH", 3.2), ("USDT", 1250.50)];

// 24h template taken from BTCUSDT; other pairs are scaled by price
const TEMPLATE_LAST: f64 = 43250.75;
const TEMPLATE_CHANGE: f64 = 1250.50;
const TEMPLATE_CHANGE_PCT: f64 = 2.98;
const TEMPLATE_HIGH: f64 = 43500.00;
const TEMPLATE_LOW: f64 = 41950.75;
const TEMPLATE_VOLUME: f64 = 28500.50;
const TEMPLATE_QUOTE_VOLUME: f64 = 1_228_500_000.0;

pub fn fallback_price(symbol: &str) -> f64 {
    FALLBACK_PRICES
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_FALLBACK_PRICE)
}

#[derive(Debug, Clone, Default)]
pub struct FallbackExchange;

impl FallbackExchange {
    pub fn new() -> Self {
        FallbackExchange
    }

    /// Oscillating synthetic series ending at the reference price
    pub fn synthetic_candles(symbol: &str, interval_ms: i64, limit: u32) -> Vec<Candle> {
        let base = fallback_price(symbol);
        let n = limit.max(1) as i64;
        let now = Utc::now().timestamp_millis();
        let last_open = now - now.rem_euclid(interval_ms);
        // Phase offset per symbol so pairs don't move in lockstep
        let phase = symbol.bytes().map(|b| b as f64).sum::<f64>() / 10.0;

        let wave = |i: i64| {
            let t = i as f64 + phase;
            1.0 + 0.02 * (t / 5.0).sin() + 0.005 * (t * 1.7).sin()
        };
        let anchor = wave(n - 1);

        (0..n)
            .filter_map(|i| {
                let close = base * wave(i) / anchor;
                let open = if i == 0 { close } else { base * wave(i - 1) / anchor };
                let high = open.max(close) * 1.002;
                let low = open.min(close) * 0.998;
                let open_time = last_open - (n - 1 - i) * interval_ms;
                let datetime = Utc.timestamp_millis_opt(open_time).single()?;
                let volume = 1000.0 + 250.0 * ((i as f64 + phase) * 0.9).cos().abs();
                Some(Candle::new_unchecked(datetime, open, high, low, close, volume))
            })
            .collect()
    }
}

#[async_trait]
impl Exchange for FallbackExchange {
    fn source(&self) -> DataSource {
        DataSource::Fallback
    }

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<TickerPrice> {
        Ok(TickerPrice {
            symbol: symbol.to_string(),
            price: fallback_price(symbol),
        })
    }

    async fn all_prices(&self) -> ExchangeResult<Vec<TickerPrice>> {
        Ok(FALLBACK_PRICES
            .iter()
            .map(|(symbol, price)| TickerPrice {
                symbol: symbol.to_string(),
                price: *price,
            })
            .collect())
    }

    async fn ticker_24h(&self, symbol: &str) -> ExchangeResult<Ticker24h> {
        let last = fallback_price(symbol);
        let scale = last / TEMPLATE_LAST;
        Ok(Ticker24h {
            symbol: symbol.to_string(),
            price_change: TEMPLATE_CHANGE * scale,
            price_change_percent: TEMPLATE_CHANGE_PCT,
            last_price: last,
            high_price: TEMPLATE_HIGH * scale,
            low_price: TEMPLATE_LOW * scale,
            volume: TEMPLATE_VOLUME,
            quote_volume: TEMPLATE_QUOTE_VOLUME * scale,
        })
    }

    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        let symbols = ["BTCUSDT", "ETHUSDT", "BNBUSDT"]
            .iter()
            .filter_map(|s| {
                let (base, quote) = split_symbol(s)?;
                Some(SymbolInfo {
                    symbol: s.to_string(),
                    status: "TRADING".to_string(),
                    base_asset: base.to_string(),
                    quote_asset: quote.to_string(),
                })
            })
            .collect();

        Ok(ExchangeInfo {
            timezone: "UTC".to_string(),
            server_time: Utc::now().timestamp_millis(),
            symbols,
        })
    }

    async fn server_time(&self) -> ExchangeResult<ServerTime> {
        Ok(ServerTime {
            server_time: Utc::now().timestamp_millis(),
        })
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        let interval_ms = interval_millis(interval)
            .filter(|_| is_valid_interval(interval))
            .ok_or_else(|| {
                ExchangeError::InvalidRequest(format!("invalid interval '{}'", interval))
            })?;
        Ok(Self::synthetic_candles(symbol, interval_ms, limit.min(1000)))
    }

    async fn balances(&self) -> ExchangeResult<Vec<Balance>> {
        Ok(FALLBACK_BALANCES
            .iter()
            .map(|(asset, free)| Balance {
                asset: asset.to_string(),
                free: *free,
                locked: 0.0,
            })
            .collect())
    }

    async fn place_market_order(
        &self,
        _symbol: &str,
        _side: Side,
        _quantity: f64,
    ) -> ExchangeResult<OrderAck> {
        Err(ExchangeError::Unsupported(
            "offline market data cannot execute orders".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn test_reference_prices() {
        let fx = FallbackExchange::new();
        assert_relative_eq!(fx.ticker_price("BTCUSDT").await.unwrap().price, 43250.75);
        assert_relative_eq!(fx.ticker_price("DOTUSDT").await.unwrap().price, 7.15);
        assert_relative_eq!(fx.ticker_price("PEPEUSDT").await.unwrap().price, 100.0);
        assert_eq!(fx.all_prices().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_24h_template_scales_by_price() {
        let fx = FallbackExchange::new();
        let btc = fx.ticker_24h("BTCUSDT").await.unwrap();
        assert_relative_eq!(btc.price_change, 1250.50, epsilon = 1e-9);
        assert_relative_eq!(btc.high_price, 43500.0, epsilon = 1e-9);
        let eth = fx.ticker_24h("ETHUSDT").await.unwrap();
        assert_relative_eq!(eth.last_price, 2580.40);
        assert!(eth.high_price > eth.last_price && eth.low_price < eth.last_price);
    }

    #[tokio::test]
    async fn test_synthetic_klines_end_at_reference_price() {
        let fx = FallbackExchange::new();
        let candles = fx.klines("ETHUSDT", "15m", 50).await.unwrap();
        assert_eq!(candles.len(), 50);
        assert_relative_eq!(candles.last().unwrap().close, 2580.40, epsilon = 1e-6);
        for pair in candles.windows(2) {
            assert_eq!(
                (pair[1].datetime - pair[0].datetime).num_minutes(),
                15
            );
        }
        assert!(candles.iter().all(|c| c.validate().is_ok()));
    }

    #[tokio::test]
    async fn test_orders_refused() {
        let fx = FallbackExchange::new();
        let result = fx.place_market_order("BTCUSDT", Side::Buy, 0.01).await;
        assert!(matches!(result, Err(ExchangeError::Unsupported(_))));
        assert!(fx.klines("BTCUSDT", "9x", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_exchange_info_and_symbol_lookup() {
        let fx = FallbackExchange::new();
        let info = fx.exchange_info().await.unwrap();
        assert_eq!(info.symbols.len(), 3);
        let eth = fx.symbol_info("ETHUSDT").await.unwrap().unwrap();
        assert_eq!(eth.base_asset, "ETH");
        assert!(fx.symbol_info("DOGEUSDT").await.unwrap().is_none());
    }
}
