mod account;
mod analysis;
mod auth;
mod auto;
mod journal;
mod keys;
mod market;
mod system;

use axum::body::Bytes;
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{ApiError, ApiResult, AppState};
use crate::exchange::Sourced;
use crate::normalize_symbol;

/// Assemble the API router
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(system::routes())
        .merge(auth::routes())
        .merge(market::routes())
        .merge(keys::routes())
        .merge(account::routes())
        .merge(analysis::routes())
        .merge(auto::routes())
        .merge(journal::routes())
}

/// `{success, data, source}` envelope for market data
fn sourced_json<T: Serialize>(sourced: Sourced<T>) -> Value {
    json!({
        "success": true,
        "data": sourced.data,
        "source": sourced.source,
    })
}

fn parse_symbol(raw: &str) -> ApiResult<String> {
    normalize_symbol(raw).ok_or_else(|| ApiError::BadRequest(format!("Invalid symbol '{}'", raw)))
}

/// Decode an optional JSON body; an empty body yields the defaults
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}
