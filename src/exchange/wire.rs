//! Binance REST payloads
//!
//! Binance transmits prices and quantities as decimal strings; these types
//! mirror the wire format and convert into the crate's domain types.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use crate::{
    Balance, Candle, ExchangeInfo, OrderAck, ServerTime, Side, SymbolInfo, Ticker24h, TickerPrice,
};

fn str_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        Raw::Num(n) => Ok(n),
    }
}

/// Binance kline/candlestick data
/// API returns an array: [open_time, open, high, low, close, volume, close_time,
///                        quote_volume, trades, taker_buy_base, taker_buy_quote, ignore]
#[derive(Debug, Clone)]
pub struct BinanceKline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl BinanceKline {
    /// Parse from raw JSON array returned by Binance API
    pub fn from_raw(raw: &[serde_json::Value]) -> Option<Self> {
        if raw.len() < 7 {
            return None;
        }

        Some(BinanceKline {
            open_time: raw[0].as_i64()?,
            open: raw[1].as_str()?.parse().ok()?,
            high: raw[2].as_str()?.parse().ok()?,
            low: raw[3].as_str()?.parse().ok()?,
            close: raw[4].as_str()?.parse().ok()?,
            volume: raw[5].as_str()?.parse().ok()?,
            close_time: raw[6].as_i64()?,
        })
    }

    /// Convert to a validated candle, dropping malformed rows
    pub fn to_candle(&self) -> Option<Candle> {
        let datetime = Utc.timestamp_millis_opt(self.open_time).single()?;
        Candle::new(
            datetime, self.open, self.high, self.low, self.close, self.volume,
        )
        .ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct RawTickerPrice {
    pub symbol: String,
    #[serde(deserialize_with = "str_f64")]
    pub price: f64,
}

impl From<RawTickerPrice> for TickerPrice {
    fn from(raw: RawTickerPrice) -> Self {
        TickerPrice {
            symbol: raw.symbol,
            price: raw.price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTicker24h {
    pub symbol: String,
    #[serde(deserialize_with = "str_f64")]
    pub price_change: f64,
    #[serde(deserialize_with = "str_f64")]
    pub price_change_percent: f64,
    #[serde(deserialize_with = "str_f64")]
    pub last_price: f64,
    #[serde(deserialize_with = "str_f64")]
    pub high_price: f64,
    #[serde(deserialize_with = "str_f64")]
    pub low_price: f64,
    #[serde(deserialize_with = "str_f64")]
    pub volume: f64,
    #[serde(deserialize_with = "str_f64")]
    pub quote_volume: f64,
}

impl From<RawTicker24h> for Ticker24h {
    fn from(raw: RawTicker24h) -> Self {
        Ticker24h {
            symbol: raw.symbol,
            price_change: raw.price_change,
            price_change_percent: raw.price_change_percent,
            last_price: raw.last_price,
            high_price: raw.high_price,
            low_price: raw.low_price,
            volume: raw.volume,
            quote_volume: raw.quote_volume,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExchangeInfo {
    pub timezone: String,
    pub server_time: i64,
    #[serde(default)]
    pub symbols: Vec<RawSymbolInfo>,
}

impl From<RawExchangeInfo> for ExchangeInfo {
    fn from(raw: RawExchangeInfo) -> Self {
        ExchangeInfo {
            timezone: raw.timezone,
            server_time: raw.server_time,
            symbols: raw
                .symbols
                .into_iter()
                .map(|s| SymbolInfo {
                    symbol: s.symbol,
                    status: s.status,
                    base_asset: s.base_asset,
                    quote_asset: s.quote_asset,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawServerTime {
    pub server_time: i64,
}

impl From<RawServerTime> for ServerTime {
    fn from(raw: RawServerTime) -> Self {
        ServerTime {
            server_time: raw.server_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawBalance {
    pub asset: String,
    #[serde(deserialize_with = "str_f64")]
    pub free: f64,
    #[serde(deserialize_with = "str_f64")]
    pub locked: f64,
}

#[derive(Debug, Deserialize)]
pub struct RawAccount {
    #[serde(default)]
    pub balances: Vec<RawBalance>,
}

impl RawAccount {
    /// Non-zero balances only
    pub fn into_balances(self) -> Vec<Balance> {
        self.balances
            .into_iter()
            .filter(|b| b.free > 0.0 || b.locked > 0.0)
            .map(|b| Balance {
                asset: b.asset,
                free: b.free,
                locked: b.locked,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct RawFill {
    #[serde(deserialize_with = "str_f64")]
    pub price: f64,
    #[serde(deserialize_with = "str_f64")]
    pub qty: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrder {
    pub symbol: String,
    pub order_id: i64,
    pub transact_time: i64,
    #[serde(deserialize_with = "str_f64")]
    pub executed_qty: f64,
    #[serde(default, deserialize_with = "str_f64")]
    pub cummulative_quote_qty: f64,
    pub status: String,
    pub side: Side,
    #[serde(default)]
    pub fills: Vec<RawFill>,
}

impl From<RawOrder> for OrderAck {
    fn from(raw: RawOrder) -> Self {
        let filled: f64 = raw.fills.iter().map(|f| f.qty).sum();
        let avg_price = if filled > 0.0 {
            raw.fills.iter().map(|f| f.price * f.qty).sum::<f64>() / filled
        } else if raw.executed_qty > 0.0 {
            raw.cummulative_quote_qty / raw.executed_qty
        } else {
            0.0
        };

        OrderAck {
            order_id: raw.order_id.to_string(),
            symbol: raw.symbol,
            side: raw.side,
            status: raw.status,
            executed_qty: raw.executed_qty,
            avg_price,
            transact_time: raw.transact_time,
        }
    }
}

/// Binance error body: `{"code": -1121, "msg": "Invalid symbol."}`
#[derive(Debug, Deserialize)]
pub struct RawApiError {
    pub code: i64,
    pub msg: String,
}

/// Valid Binance intervals
pub const BINANCE_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Check if interval is valid for Binance
pub fn is_valid_interval(interval: &str) -> bool {
    BINANCE_INTERVALS.contains(&interval)
}

/// Interval length in milliseconds (months approximated as 30 days)
pub fn interval_millis(interval: &str) -> Option<i64> {
    let unit = interval.chars().last()?;
    let n: i64 = interval[..interval.len() - unit.len_utf8()].parse().ok()?;
    let unit_ms = match unit {
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        'w' => 7 * 86_400_000,
        'M' => 30 * 86_400_000,
        _ => return None,
    };
    Some(n * unit_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kline_from_raw() {
        let raw: Vec<serde_json::Value> = serde_json::from_str(
            r#"[1499040000000,"0.01634790","0.80000000","0.01575800","0.01577100","148976.11427815",1499644799999,"2434.19055334",308,"1756.87402397","28.46694368","0"]"#,
        )
        .unwrap();
        let kline = BinanceKline::from_raw(&raw).unwrap();
        assert_eq!(kline.open_time, 1499040000000);
        assert_relative_eq!(kline.high, 0.8);
        let candle = kline.to_candle().unwrap();
        assert_relative_eq!(candle.close, 0.015771);
    }

    #[test]
    fn test_kline_rejects_short_rows() {
        let raw = vec![serde_json::json!(1), serde_json::json!("1.0")];
        assert!(BinanceKline::from_raw(&raw).is_none());
    }

    #[test]
    fn test_order_average_price_from_fills() {
        let raw: RawOrder = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","orderId":28,"clientOrderId":"x","transactTime":1507725176595,
                "price":"0.00000000","origQty":"2.00000000","executedQty":"2.00000000",
                "cummulativeQuoteQty":"8000.00000000","status":"FILLED","timeInForce":"GTC",
                "type":"MARKET","side":"BUY",
                "fills":[{"price":"3900.0","qty":"1.0","commission":"0","commissionAsset":"BNB"},
                         {"price":"4100.0","qty":"1.0","commission":"0","commissionAsset":"BNB"}]}"#,
        )
        .unwrap();
        let ack: OrderAck = raw.into();
        assert_eq!(ack.order_id, "28");
        assert_eq!(ack.side, Side::Buy);
        assert_relative_eq!(ack.avg_price, 4000.0);
    }

    #[test]
    fn test_account_filters_zero_balances() {
        let raw: RawAccount = serde_json::from_str(
            r#"{"balances":[{"asset":"BTC","free":"0.5","locked":"0.0"},
                            {"asset":"LTC","free":"0.00000000","locked":"0.00000000"}]}"#,
        )
        .unwrap();
        let balances = raw.into_balances();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].asset, "BTC");
    }

    #[test]
    fn test_intervals() {
        assert!(is_valid_interval("15m"));
        assert!(!is_valid_interval("7m"));
        assert_eq!(interval_millis("15m"), Some(900_000));
        assert_eq!(interval_millis("1d"), Some(86_400_000));
        assert_eq!(interval_millis(""), None);
    }
}
