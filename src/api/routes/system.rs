use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{ApiResult, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/debug/db-check", get(db_check))
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "DeepSignal API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = if state.store.ping().is_ok() { "ok" } else { "error" };
    Json(json!({
        "status": "healthy",
        "database": database,
        "paper_trading": state.connector.paper_trading(),
        "fallback_enabled": state.market.fallback_enabled(),
        "bots_running": state.bots.running_count().await,
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}

async fn db_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let users = state.store.count_users()?;
    Ok(Json(json!({
        "status": "ok",
        "user_count": users,
    })))
}
