use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_symbol, sourced_json};
use crate::api::{ApiError, ApiResult, AppState};
use crate::exchange::binance::MAX_KLINES_PER_REQUEST;
use crate::exchange::wire::is_valid_interval;

#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    symbol: Option<String>,
    /// Comma separated list
    symbols: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KlinesQuery {
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_limit() -> u32 {
    100
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/crypto/prices", get(prices))
        .route("/api/crypto/prices/{symbol}", get(price))
        .route("/api/crypto/ticker/{symbol}", get(ticker))
        .route("/api/crypto/exchange-info", get(exchange_info))
        .route("/api/crypto/symbols/{symbol}", get(symbol_info))
        .route("/api/crypto/server-time", get(server_time))
        .route("/api/crypto/klines/{symbol}", get(klines))
}

async fn prices(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PricesQuery>,
) -> ApiResult<Json<Value>> {
    if let Some(symbol) = q.symbol.as_deref().filter(|s| !s.trim().is_empty()) {
        let symbol = parse_symbol(symbol)?;
        return Ok(Json(sourced_json(state.market.ticker_price(&symbol).await?)));
    }

    if let Some(list) = q.symbols.as_deref().filter(|s| !s.trim().is_empty()) {
        let symbols = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(parse_symbol)
            .collect::<ApiResult<Vec<_>>>()?;
        let quotes = state.market.prices_for(&symbols).await?;
        let data: Vec<Value> = quotes
            .into_iter()
            .map(|q| json!({ "symbol": q.data.symbol, "price": q.data.price, "source": q.source }))
            .collect();
        return Ok(Json(json!({ "success": true, "data": data })));
    }

    Ok(Json(sourced_json(state.market.all_prices().await?)))
}

async fn price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Value>> {
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(sourced_json(state.market.ticker_price(&symbol).await?)))
}

async fn ticker(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Value>> {
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(sourced_json(state.market.ticker_24h(&symbol).await?)))
}

async fn exchange_info(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    Ok(Json(sourced_json(state.market.exchange_info().await?)))
}

async fn symbol_info(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Value>> {
    let symbol = parse_symbol(&symbol)?;
    let info = state.market.symbol_info(&symbol).await?;
    if info.data.is_none() {
        return Err(ApiError::NotFound(format!("Symbol {} not found", symbol)));
    }
    Ok(Json(sourced_json(info)))
}

async fn server_time(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    Ok(Json(sourced_json(state.market.server_time().await?)))
}

async fn klines(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(q): Query<KlinesQuery>,
) -> ApiResult<Json<Value>> {
    let symbol = parse_symbol(&symbol)?;
    if !is_valid_interval(&q.interval) {
        return Err(ApiError::BadRequest(format!("Invalid interval '{}'", q.interval)));
    }
    let limit = q.limit.clamp(1, MAX_KLINES_PER_REQUEST);
    Ok(Json(sourced_json(
        state.market.klines(&symbol, &q.interval, limit).await?,
    )))
}
