use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{ApiResult, AppState, CurrentUser};
use crate::auth::{LoginRequest, RegisterRequest};
use crate::store::User;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

// bcrypt is CPU bound; keep it off the async workers
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    let auth = state.auth.clone();
    let user = tokio::task::spawn_blocking(move || auth.register(&req)).await??;
    Ok(Json(user))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let auth = state.auth.clone();
    let (user, token) = tokio::task::spawn_blocking(move || auth.login(&req)).await??;
    Ok(Json(json!({
        "access_token": token.access_token,
        "token_type": token.token_type,
        "expires_in": token.expires_in,
        "user": user,
    })))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
