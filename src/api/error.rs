use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;
use crate::bot::BotError;
use crate::exchange::ExchangeError;
use crate::store::StoreError;
use crate::vault::VaultError;

/// Error returned by every handler; rendered as `{"detail": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    /// The exchange failed or answered garbage
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::BadGateway(msg)
            | Self::ServiceUnavailable(msg)
            | Self::Internal(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), detail = %self, "Request failed");
        }
        let body = Json(json!({ "detail": self.to_string() }));

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(_) | AuthError::EmailTaken => Self::BadRequest(e.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                Self::Unauthorized(e.to_string())
            }
            AuthError::Store(inner) => inner.into(),
            AuthError::Hashing(_) | AuthError::Token(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => Self::Conflict(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(e: ExchangeError) -> Self {
        match &e {
            ExchangeError::MissingCredentials => {
                Self::BadRequest("No active exchange API key; add one first".to_string())
            }
            ExchangeError::InvalidRequest(_)
            | ExchangeError::InsufficientBalance { .. }
            | ExchangeError::Unsupported(_) => Self::BadRequest(e.to_string()),
            ExchangeError::CircuitOpen => Self::ServiceUnavailable(e.to_string()),
            ExchangeError::Api { .. } if e.is_auth_failure() => {
                Self::BadRequest(format!("Exchange rejected the API key: {}", e))
            }
            ExchangeError::Api { status, .. }
                if (400..500).contains(status) && !e.is_unavailable() =>
            {
                Self::BadRequest(e.to_string())
            }
            _ => Self::BadGateway(e.to_string()),
        }
    }
}

impl From<BotError> for ApiError {
    fn from(e: BotError) -> Self {
        match e {
            BotError::AlreadyRunning | BotError::NotRunning => Self::Conflict(e.to_string()),
            BotError::UnknownStrategy(msg) => Self::BadRequest(msg),
            BotError::Exchange(inner) => inner.into(),
            BotError::Store(inner) => inner.into(),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_error_mapping() {
        let not_found = ApiError::from(ExchangeError::Api {
            status: 400,
            code: Some(-1121),
            message: "Invalid symbol.".into(),
        });
        assert_eq!(not_found.status(), StatusCode::BAD_REQUEST);

        let outage = ApiError::from(ExchangeError::Api {
            status: 503,
            code: None,
            message: "down".into(),
        });
        assert_eq!(outage.status(), StatusCode::BAD_GATEWAY);

        let blocked = ApiError::from(ExchangeError::Api {
            status: 451,
            code: None,
            message: "restricted location".into(),
        });
        assert_eq!(blocked.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(
            ApiError::from(ExchangeError::CircuitOpen).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(ExchangeError::MissingCredentials).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(ApiError::from(AuthError::EmailTaken).status(), StatusCode::BAD_REQUEST);
        let invalid = ApiError::from(AuthError::InvalidCredentials);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = ApiError::Unauthorized("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
