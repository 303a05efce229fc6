use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{optional_body, parse_symbol};
use crate::api::{ApiError, ApiResult, AppState};
use crate::exchange::binance::MAX_KLINES_PER_REQUEST;
use crate::exchange::wire::is_valid_interval;
use crate::indicators::snapshot;
use crate::strategies::{available_strategies, create_strategy};

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

const DEFAULT_ANALYSIS_LIMIT: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ai/analyze/{symbol}", post(analyze))
        .route("/api/ai/strategies", get(strategies))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let req: AnalyzeRequest = optional_body(&body)?;

    let symbol = parse_symbol(&symbol)?;
    let strategy_name = req
        .strategy
        .unwrap_or_else(|| state.config.trading.default_strategy.clone());
    let strategy =
        create_strategy(&strategy_name).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let interval = req
        .interval
        .unwrap_or_else(|| state.config.trading.bot.interval.clone());
    if !is_valid_interval(&interval) {
        return Err(ApiError::BadRequest(format!("Invalid interval '{}'", interval)));
    }
    let limit = req
        .limit
        .unwrap_or(DEFAULT_ANALYSIS_LIMIT)
        .clamp(1, MAX_KLINES_PER_REQUEST);

    let candles = state.market.klines(&symbol, &interval, limit).await?;
    let analysis = strategy.analyze(&candles.data);

    Ok(Json(json!({
        "success": true,
        "symbol": symbol,
        "strategy": strategy.name(),
        "interval": interval,
        "candles": candles.data.len(),
        "analysis": analysis,
        "indicators": snapshot(&candles.data),
        "source": candles.source,
        "timestamp": Utc::now(),
    })))
}

async fn strategies(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "strategies": available_strategies(),
        "default": state.config.trading.default_strategy,
    }))
}
