use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ApiError, ApiResult, AppState, CurrentUser, SUPPORTED_EXCHANGE};
use crate::exchange::Credentials;
use crate::store::ExchangeKeyRecord;
use crate::vault::mask_api_key;

#[derive(Debug, Deserialize)]
pub struct SaveKeyRequest {
    #[serde(default = "default_exchange")]
    exchange_name: String,
    api_key: String,
    secret_key: String,
    /// Check the key against the exchange before saving
    #[serde(default)]
    verify: Option<bool>,
}

fn default_exchange() -> String {
    SUPPORTED_EXCHANGE.to_string()
}

/// Stored key as shown to its owner
#[derive(Debug, Serialize)]
pub struct KeyView {
    id: i64,
    exchange_name: String,
    api_key: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/crypto/exchange-keys", post(save_key).get(list_keys))
        .route("/api/crypto/exchange-keys/{id}", delete(delete_key))
        .route("/api/crypto/test-connection", get(test_connection))
}

fn key_view(state: &AppState, record: ExchangeKeyRecord) -> KeyView {
    let uid = record.user_id.to_string();
    let masked = match state
        .vault
        .decrypt(&record.api_key, &[uid.as_str(), record.exchange_name.as_str()])
    {
        Ok(plain) => mask_api_key(&plain),
        Err(e) => {
            warn!(key_id = record.id, error = %e, "Stored API key unreadable");
            "****".to_string()
        }
    };
    KeyView {
        id: record.id,
        exchange_name: record.exchange_name,
        api_key: masked,
        is_active: record.is_active,
        created_at: record.created_at,
    }
}

async fn save_key(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SaveKeyRequest>,
) -> ApiResult<Json<Value>> {
    let exchange = req.exchange_name.trim().to_ascii_lowercase();
    if exchange != SUPPORTED_EXCHANGE {
        return Err(ApiError::BadRequest(format!("Unsupported exchange '{}'", req.exchange_name)));
    }
    let api_key = req.api_key.trim();
    let secret = req.secret_key.trim();
    if api_key.is_empty() || secret.is_empty() {
        return Err(ApiError::BadRequest("api_key and secret_key are required".to_string()));
    }

    let verify = req.verify.unwrap_or(state.config.exchange.verify_keys);
    if verify && !state.connector.paper_trading() {
        let account = state
            .connector
            .account(&user.id.to_string(), Some(Credentials::new(api_key, secret)))?;
        account.balances().await?;
        info!(user_id = user.id, "Exchange key verified");
    }

    let uid = user.id.to_string();
    let aad = [uid.as_str(), exchange.as_str()];
    let stored_key = state.vault.encrypt(api_key, &aad)?;
    let stored_secret = state.vault.encrypt(secret, &aad)?;
    let record = state
        .store
        .insert_exchange_key(user.id, &exchange, &stored_key, &stored_secret)?;

    info!(user_id = user.id, key_id = record.id, exchange = %exchange, "Exchange key saved");
    Ok(Json(json!({
        "success": true,
        "message": "Exchange key saved",
        "data": key_view(&state, record),
    })))
}

async fn list_keys(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let keys: Vec<KeyView> = state
        .store
        .list_exchange_keys(user.id)?
        .into_iter()
        .map(|r| key_view(&state, r))
        .collect();
    Ok(Json(json!({ "success": true, "data": keys })))
}

async fn delete_key(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete_exchange_key(id, user.id)? {
        return Err(ApiError::NotFound("Exchange key not found".to_string()));
    }
    info!(user_id = user.id, key_id = id, "Exchange key deleted");
    Ok(Json(json!({ "success": true, "message": "Exchange key deleted" })))
}

async fn test_connection(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let account = state.account_for(&user)?;
    let report = account.test_connection().await?;
    Ok(Json(json!({
        "success": true,
        "data": report,
        "source": account.source(),
        "paper_trading": state.connector.paper_trading(),
    })))
}
