use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::parse_symbol;
use crate::api::{ApiError, ApiResult, AppState, CurrentUser};
use crate::store::NewJournalEntry;
use crate::{OrderAck, Side};

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    symbol: String,
    side: String,
    quantity: f64,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/account/balance", get(balance))
        .route("/api/trading/order", post(place_order))
}

async fn balance(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let account = state.account_for(&user)?;
    let balances = account.balances().await?;
    Ok(Json(json!({
        "success": true,
        "data": balances,
        "source": account.source(),
    })))
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<OrderRequest>,
) -> ApiResult<Json<Value>> {
    let symbol = parse_symbol(&req.symbol)?;
    let side: Side = req.side.parse().map_err(ApiError::BadRequest)?;
    if !(req.quantity.is_finite() && req.quantity > 0.0) {
        return Err(ApiError::BadRequest("quantity must be positive".to_string()));
    }

    let account = state.account_for(&user)?;
    let ack = account.place_market_order(&symbol, side, req.quantity).await?;
    info!(
        user_id = user.id,
        symbol = %symbol,
        side = %side,
        quantity = req.quantity,
        order_id = %ack.order_id,
        "Manual order filled"
    );

    // The order has filled: nothing below may turn this into an error response
    let quoted = if ack.avg_price > 0.0 {
        None
    } else {
        match state.market.ticker_price(&symbol).await {
            Ok(quote) => Some(quote.data.price),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Price lookup after fill failed");
                None
            }
        }
    };
    let entry = manual_journal_entry(user.id, &symbol, side, req.quantity, &ack, quoted);
    let journal_id = match entry {
        Some(entry) => match state.store.open_journal_entry(&entry) {
            Ok(saved) => Some(saved.id),
            Err(e) => {
                warn!(error = %e, "Failed to journal manual order");
                None
            }
        },
        None => {
            warn!(order_id = %ack.order_id, "Fill price unknown, manual order not journaled");
            None
        }
    };

    Ok(Json(json!({
        "success": true,
        "data": ack,
        "journal_id": journal_id,
        "source": account.source(),
    })))
}

/// Journal row for a filled manual order; `None` when no fill price is known
fn manual_journal_entry(
    user_id: i64,
    symbol: &str,
    side: Side,
    requested_qty: f64,
    ack: &OrderAck,
    quoted_price: Option<f64>,
) -> Option<NewJournalEntry> {
    let entry_price = if ack.avg_price > 0.0 {
        ack.avg_price
    } else {
        quoted_price.filter(|p| *p > 0.0)?
    };
    let quantity = if ack.executed_qty > 0.0 {
        ack.executed_qty
    } else {
        requested_qty
    };

    Some(NewJournalEntry {
        user_id,
        symbol: symbol.to_string(),
        action: side,
        quantity,
        entry_price,
        notes: Some("manual order".to_string()),
        order_id: Some(ack.order_id.clone()),
        ..Default::default()
    })
}
