//! Binance Spot REST client
//!
//! Public market data needs no credentials. Account and order endpoints are
//! SIGNED: the query string carries `timestamp` and `recvWindow`, and an
//! HMAC-SHA256 `signature` computed over it.
//!
//! Every request passes through the circuit breaker and the throttle. Reads
//! are retried with exponential backoff on transient failures; orders are
//! sent exactly once.
//!
//! # Example
//! ```no_run
//! use deep_signal::exchange::{BinanceClient, BinanceConfig, Exchange};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BinanceClient::new(BinanceConfig::mainnet())?;
//!     let candles = client.klines("BTCUSDT", "1h", 100).await?;
//!     println!("Fetched {} candles", candles.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use itertools::Itertools;
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::auth::{Credentials, API_KEY_HEADER};
use super::error::{ExchangeError, ExchangeResult};
use super::wire::{
    is_valid_interval, BinanceKline, RawAccount, RawApiError, RawExchangeInfo, RawOrder,
    RawServerTime, RawTicker24h, RawTickerPrice,
};
use super::Exchange;
use crate::common::{BreakerConfig, CircuitBreaker, Throttle};
use crate::{
    Balance, Candle, DataSource, ExchangeInfo, OrderAck, ServerTime, Side, SymbolInfo, Ticker24h,
    TickerPrice,
};

/// Production REST endpoint
pub const MAINNET_BASE_URL: &str = "https://api.binance.com/api/v3";

/// Spot testnet REST endpoint
pub const TESTNET_BASE_URL: &str = "https://testnet.binance.vision/api/v3";

/// Maximum klines per request (Binance limit)
pub const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// Client configuration
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Retry attempts for idempotent reads
    pub max_retries: u32,
    /// Minimum spacing between requests
    pub min_request_interval: Duration,
    /// `recvWindow` for signed requests, in milliseconds
    pub recv_window: u64,
    pub breaker: BreakerConfig,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl BinanceConfig {
    pub fn mainnet() -> Self {
        Self {
            base_url: MAINNET_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            min_request_interval: Duration::from_millis(100),
            recv_window: 5000,
            breaker: BreakerConfig::default(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            base_url: TESTNET_BASE_URL.to_string(),
            ..Self::mainnet()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }
}

/// Binance Spot API client
#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    throttle: Throttle,
    max_retries: u32,
    recv_window: u64,
}

impl BinanceClient {
    /// Create a client for public endpoints
    pub fn new(config: BinanceConfig) -> ExchangeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: None,
            breaker: Arc::new(Mutex::new(CircuitBreaker::new(config.breaker))),
            throttle: Throttle::new(config.min_request_interval),
            max_retries: config.max_retries,
            recv_window: config.recv_window,
        })
    }

    /// Attach account credentials, enabling signed endpoints
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a request through breaker, throttle and (optionally) retries
    async fn execute<F, Fut, T>(&self, retry: bool, operation: F) -> ExchangeResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ExchangeResult<T>>,
    {
        if !self.breaker().allow_request() {
            return Err(ExchangeError::CircuitOpen);
        }

        let attempts = if retry { self.max_retries + 1 } else { 1 };
        let mut attempt = 0;

        loop {
            self.throttle.wait().await;

            match operation().await {
                Ok(value) => {
                    self.breaker().record_success();
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    warn!(attempt, max = attempts, error = %e, "Binance request failed");
                    if attempt >= attempts {
                        self.breaker().record_failure();
                        return Err(e);
                    }
                    // Exponential backoff: 250ms, 500ms, 1s...
                    let delay = Duration::from_millis(250 * 2u64.pow(attempt - 1));
                    debug!("Retrying after {}ms", delay.as_millis());
                    sleep(delay).await;
                }
                // Client errors say nothing about venue health
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_raw(request: RequestBuilder) -> ExchangeResult<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn public_get<T>(&self, path: &str, params: &[(&str, String)]) -> ExchangeResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let body = self
            .execute(true, || {
                Self::send_raw(self.http.get(&url).query(params))
            })
            .await?;
        parse_body(&body)
    }

    async fn signed<T>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        retry: bool,
    ) -> ExchangeResult<T>
    where
        T: DeserializeOwned,
    {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(ExchangeError::MissingCredentials)?;

        let body = self
            .execute(retry, || {
                let method = method.clone();
                // Timestamp is regenerated per attempt so retries stay inside recvWindow
                let query = signed_query(params, Utc::now().timestamp_millis(), self.recv_window);
                let url = credentials.sign(&query).map(|signature| {
                    format!("{}{}?{}&signature={}", self.base_url, path, query, signature)
                });
                let request = url.map(|url| {
                    self.http
                        .request(method, url)
                        .header(API_KEY_HEADER, credentials.api_key())
                });
                async move { Self::send_raw(request?).await }
            })
            .await?;
        parse_body(&body)
    }
}

/// Query string for a signed request, before the signature is appended
pub fn signed_query(params: &[(&str, String)], timestamp: i64, recv_window: u64) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .chain([
            format!("recvWindow={}", recv_window),
            format!("timestamp={}", timestamp),
        ])
        .join("&")
}

/// Order quantity as a plain decimal string (no exponent, at most 8 decimals)
pub fn format_quantity(quantity: f64) -> ExchangeResult<String> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ExchangeError::InvalidRequest(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    let decimal = Decimal::from_f64(quantity)
        .ok_or_else(|| {
            ExchangeError::InvalidRequest(format!("unrepresentable quantity {}", quantity))
        })?;
    let rounded = decimal.round_dp(8).normalize();
    if rounded.is_zero() {
        return Err(ExchangeError::InvalidRequest(format!(
            "quantity {} rounds to zero",
            quantity
        )));
    }
    Ok(rounded.to_string())
}

fn parse_body<T: DeserializeOwned>(body: &str) -> ExchangeResult<T> {
    serde_json::from_str(body).map_err(|e| ExchangeError::Parse(e.to_string()))
}

/// Map a non-2xx response into an API error, keeping Binance's code when present
pub fn api_error(status: u16, body: &str) -> ExchangeError {
    match serde_json::from_str::<RawApiError>(body) {
        Ok(err) => ExchangeError::Api {
            status,
            code: Some(err.code),
            message: err.msg,
        },
        Err(_) => ExchangeError::Api {
            status,
            code: None,
            message: body.chars().take(200).collect(),
        },
    }
}

#[async_trait]
impl Exchange for BinanceClient {
    fn source(&self) -> DataSource {
        DataSource::Binance
    }

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<TickerPrice> {
        let raw: RawTickerPrice = self
            .public_get("/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        Ok(raw.into())
    }

    async fn all_prices(&self) -> ExchangeResult<Vec<TickerPrice>> {
        let raw: Vec<RawTickerPrice> = self.public_get("/ticker/price", &[]).await?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn ticker_24h(&self, symbol: &str) -> ExchangeResult<Ticker24h> {
        let raw: RawTicker24h = self
            .public_get("/ticker/24hr", &[("symbol", symbol.to_string())])
            .await?;
        Ok(raw.into())
    }

    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        let raw: RawExchangeInfo = self.public_get("/exchangeInfo", &[]).await?;
        Ok(raw.into())
    }

    async fn symbol_info(&self, symbol: &str) -> ExchangeResult<Option<SymbolInfo>> {
        let result: ExchangeResult<RawExchangeInfo> = self
            .public_get("/exchangeInfo", &[("symbol", symbol.to_string())])
            .await;
        match result {
            Ok(raw) => Ok(ExchangeInfo::from(raw).symbols.into_iter().next()),
            // -1121: Invalid symbol
            Err(ExchangeError::Api {
                code: Some(-1121), ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn server_time(&self) -> ExchangeResult<ServerTime> {
        let raw: RawServerTime = self.public_get("/time", &[]).await?;
        Ok(raw.into())
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        if !is_valid_interval(interval) {
            return Err(ExchangeError::InvalidRequest(format!(
                "invalid interval '{}'",
                interval
            )));
        }
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST);

        debug!(symbol, interval, limit, "Fetching klines");

        let raw: Vec<Vec<serde_json::Value>> = self
            .public_get(
                "/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(raw
            .iter()
            .filter_map(|row| BinanceKline::from_raw(row))
            .filter_map(|k| k.to_candle())
            .collect())
    }

    async fn balances(&self) -> ExchangeResult<Vec<Balance>> {
        let account: RawAccount = self.signed(Method::GET, "/account", &[], true).await?;
        Ok(account.into_balances())
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> ExchangeResult<OrderAck> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", format_quantity(quantity)?),
            ("newOrderRespType", "FULL".to_string()),
        ];

        let raw: RawOrder = self.signed(Method::POST, "/order", &params, false).await?;
        let ack = OrderAck::from(raw);
        tracing::info!(
            symbol = %ack.symbol,
            side = %ack.side,
            order_id = %ack.order_id,
            qty = ack.executed_qty,
            price = ack.avg_price,
            "Market order filled"
        );
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_query_order() {
        let q = signed_query(
            &[("symbol", "BTCUSDT".into()), ("side", "BUY".into())],
            1499827319559,
            5000,
        );
        assert_eq!(
            q,
            "symbol=BTCUSDT&side=BUY&recvWindow=5000&timestamp=1499827319559"
        );
        assert_eq!(signed_query(&[], 1, 5000), "recvWindow=5000&timestamp=1");
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(0.001).unwrap(), "0.001");
        assert_eq!(format_quantity(1.0).unwrap(), "1");
        assert_eq!(format_quantity(0.123456789).unwrap(), "0.12345679");
        assert!(format_quantity(0.0).is_err());
        assert!(format_quantity(-1.0).is_err());
        assert!(format_quantity(f64::NAN).is_err());
        assert!(format_quantity(1e-10).is_err());
    }

    #[test]
    fn test_api_error_parsing() {
        match api_error(400, r#"{"code":-1121,"msg":"Invalid symbol."}"#) {
            ExchangeError::Api { status, code, message } => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(-1121));
                assert_eq!(message, "Invalid symbol.");
            }
            other => panic!("unexpected {:?}", other),
        }
        match api_error(502, "<html>Bad gateway</html>") {
            ExchangeError::Api { code, .. } => assert_eq!(code, None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_config_urls() {
        assert_eq!(BinanceConfig::mainnet().base_url, MAINNET_BASE_URL);
        assert_eq!(BinanceConfig::testnet().base_url, TESTNET_BASE_URL);
        let custom = BinanceConfig::mainnet().with_base_url("http://127.0.0.1:9000/api/v3/");
        assert_eq!(custom.base_url, "http://127.0.0.1:9000/api/v3");
    }

    #[tokio::test]
    async fn test_signed_endpoint_requires_credentials() {
        let client = BinanceClient::new(BinanceConfig::mainnet()).unwrap();
        assert!(matches!(
            client.balances().await,
            Err(ExchangeError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_invalid_interval_rejected_locally() {
        let client = BinanceClient::new(BinanceConfig::mainnet()).unwrap();
        assert!(matches!(
            client.klines("BTCUSDT", "7m", 10).await,
            Err(ExchangeError::InvalidRequest(_))
        ));
    }
}
