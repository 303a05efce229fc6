use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{optional_body, parse_symbol};
use crate::api::{ApiError, ApiResult, AppState, CurrentUser};
use crate::bot::{AutoTrader, BotStatus, JournalSink};
use crate::exchange::wire::is_valid_interval;
use crate::strategies::{available_strategies, create_strategy};

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    quantity: Option<f64>,
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StrategyRequest {
    strategy: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auto/start", post(start))
        .route("/api/auto/stop", post(stop))
        .route("/api/auto/status", get(status))
        .route("/api/auto/strategy", post(set_strategy))
        .route("/api/auto/strategies", get(strategies))
}

async fn start(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let req: StartRequest = optional_body(&body)?;
    let mut settings = state.config.trading.bot.clone();
    if let Some(symbol) = req.symbol.as_deref() {
        settings.symbol = parse_symbol(symbol)?;
    }
    if let Some(quantity) = req.quantity {
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(ApiError::BadRequest("quantity must be positive".to_string()));
        }
        settings.quantity = quantity;
    }
    if let Some(interval) = req.interval {
        if !is_valid_interval(&interval) {
            return Err(ApiError::BadRequest(format!("Invalid interval '{}'", interval)));
        }
        settings.interval = interval;
    }

    let strategy_name = match req.strategy {
        Some(name) => name,
        None => state
            .bots
            .preferred_strategy(user.id)
            .await
            .unwrap_or_else(|| state.config.trading.default_strategy.clone()),
    };
    let strategy =
        create_strategy(&strategy_name).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let account = state.account_for(&user)?;
    let trader = AutoTrader::new(account, strategy, settings).with_journal(JournalSink {
        store: state.store.clone(),
        user_id: user.id,
    });
    let status = state.bots.start(user.id, trader).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Auto trading started",
        "paper_trading": state.connector.paper_trading(),
        "status": status,
    })))
}

async fn stop(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let status = state.bots.stop(user.id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Auto trading stopped",
        "status": status,
    })))
}

async fn status(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Json<Value> {
    let status = match state.bots.status(user.id).await {
        Some(status) => status,
        None => {
            let strategy = state
                .bots
                .preferred_strategy(user.id)
                .await
                .unwrap_or_else(|| state.config.trading.default_strategy.clone());
            BotStatus::idle(&strategy, &state.config.trading.bot)
        }
    };
    Json(json!({ "success": true, "data": status }))
}

async fn set_strategy(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<StrategyRequest>,
) -> ApiResult<Json<Value>> {
    let applied = state.bots.set_strategy(user.id, &req.strategy).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Strategy changed to {}", applied),
        "strategy": applied,
    })))
}

async fn strategies() -> Json<Value> {
    Json(json!({ "success": true, "strategies": available_strategies() }))
}
