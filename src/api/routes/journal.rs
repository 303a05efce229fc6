use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::parse_symbol;
use crate::api::{ApiError, ApiResult, AppState, CurrentUser};
use crate::store::NewJournalEntry;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    open_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    exit_price: f64,
    #[serde(default)]
    exit_reason: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/journal/trades", get(list_trades).post(create_trade))
        .route("/api/journal/trades/{id}", get(get_trade))
        .route("/api/journal/trades/{id}/close", post(close_trade))
        .route("/api/journal/summary", get(summary))
}

fn positive(value: f64, field: &str) -> ApiResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("{} must be positive", field)))
    }
}

async fn list_trades(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let trades = state.store.list_journal(user.id, q.open_only)?;
    Ok(Json(json!({ "success": true, "data": trades })))
}

async fn create_trade(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(mut entry): Json<NewJournalEntry>,
) -> ApiResult<Json<Value>> {
    entry.user_id = user.id;
    entry.symbol = parse_symbol(&entry.symbol)?;
    positive(entry.quantity, "quantity")?;
    positive(entry.entry_price, "entry_price")?;

    let saved = state.store.open_journal_entry(&entry)?;
    Ok(Json(json!({ "success": true, "data": saved })))
}

async fn get_trade(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let entry = state
        .store
        .journal_entry(id, user.id)?
        .ok_or_else(|| ApiError::NotFound("Trade not found".to_string()))?;
    Ok(Json(json!({ "success": true, "data": entry })))
}

async fn close_trade(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<CloseRequest>,
) -> ApiResult<Json<Value>> {
    positive(req.exit_price, "exit_price")?;
    let reason = req.exit_reason.as_deref().unwrap_or("manual");
    let closed = state
        .store
        .close_journal_entry(id, user.id, req.exit_price, reason)?
        .ok_or_else(|| ApiError::NotFound("Open trade not found".to_string()))?;
    Ok(Json(json!({ "success": true, "data": closed })))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let summary = state.store.journal_summary(user.id)?;
    Ok(Json(json!({ "success": true, "data": summary })))
}
