//! HTTP JSON API
//!
//! Handlers receive `State<Arc<AppState>>`; authenticated routes take a
//! [`CurrentUser`] extractor. Errors render as `{"detail": "..."}`.

mod error;
mod extractor;
mod routes;

pub use error::{ApiError, ApiResult};
pub use extractor::CurrentUser;

use axum::http::HeaderValue;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{Authenticator, TokenIssuer};
use crate::bot::BotManager;
use crate::config::AppConfig;
use crate::exchange::{Credentials, Exchange, ExchangeConnector, MarketService};
use crate::store::{Store, User};
use crate::vault::Vault;

/// Exchange whose keys users may store
pub const SUPPORTED_EXCHANGE: &str = "binance";

/// Shared application state, passed to all route handlers via `axum::extract::State`
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub auth: Authenticator,
    pub vault: Vault,
    pub market: MarketService,
    pub connector: Arc<dyn ExchangeConnector>,
    pub bots: BotManager,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Store,
        connector: Arc<dyn ExchangeConnector>,
        vault: Vault,
    ) -> Arc<Self> {
        let tokens = TokenIssuer::new(&config.jwt_secret(), config.auth.token_ttl_minutes);
        let auth = Authenticator::new(store.clone(), tokens, config.auth.bcrypt_cost);
        let market = MarketService::new(connector.public(), config.exchange.fallback_enabled);

        Arc::new(Self {
            config,
            store,
            auth,
            vault,
            market,
            connector,
            bots: BotManager::new(),
            started_at: Utc::now(),
        })
    }

    /// Decrypted credentials from the user's active key, if any
    pub fn credentials_for(&self, user: &User) -> ApiResult<Option<Credentials>> {
        let Some(record) = self.store.active_exchange_key(user.id, SUPPORTED_EXCHANGE)? else {
            return Ok(None);
        };
        let uid = user.id.to_string();
        let aad = [uid.as_str(), record.exchange_name.as_str()];
        let api_key = self.vault.decrypt(&record.api_key, &aad)?;
        let secret = self.vault.decrypt(&record.secret_key, &aad)?;
        Ok(Some(Credentials::new(api_key, secret)))
    }

    /// The user's trading account: live with their stored key, or simulated in paper mode
    pub fn account_for(&self, user: &User) -> ApiResult<Arc<dyn Exchange>> {
        let credentials = if self.connector.paper_trading() {
            None
        } else {
            self.credentials_for(user)?
        };
        Ok(self.connector.account(&user.id.to_string(), credentials)?)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Assemble the full application router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    routes::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
