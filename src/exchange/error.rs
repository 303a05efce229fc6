//! Exchange error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("API credentials required for this endpoint")]
    MissingCredentials,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient {asset} balance: need {needed:.8}, have {available:.8}")]
    InsufficientBalance {
        asset: String,
        needed: f64,
        available: f64,
    },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Circuit breaker is open, rejecting request")]
    CircuitOpen,
}

impl ExchangeError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the venue itself is unreachable or refusing service, as opposed
    /// to rejecting this particular request. 403/451 are Binance geo-blocks.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Network(_) | Self::CircuitOpen | Self::Parse(_) => true,
            Self::Api { status, .. } => matches!(*status, 403 | 429 | 451) || *status >= 500,
            _ => false,
        }
    }

    /// Whether the venue rejected the caller's credentials
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::MissingCredentials => true,
            Self::Api { status, code, .. } => {
                *status == 401 || matches!(code, Some(-2014) | Some(-2015) | Some(-1022))
            }
            _ => false,
        }
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let throttled = ExchangeError::Api {
            status: 429,
            code: Some(-1003),
            message: "Too many requests".into(),
        };
        let rejected = ExchangeError::Api {
            status: 400,
            code: Some(-1121),
            message: "Invalid symbol.".into(),
        };
        assert!(throttled.is_transient());
        assert!(!rejected.is_transient());
        assert!(!ExchangeError::MissingCredentials.is_transient());
    }

    #[test]
    fn test_unavailable_classification() {
        let geo_blocked = ExchangeError::Api {
            status: 451,
            code: None,
            message: "restricted location".into(),
        };
        let bad_symbol = ExchangeError::Api {
            status: 400,
            code: Some(-1121),
            message: "Invalid symbol.".into(),
        };
        assert!(geo_blocked.is_unavailable());
        assert!(ExchangeError::CircuitOpen.is_unavailable());
        assert!(!bad_symbol.is_unavailable());
        assert!(!ExchangeError::InvalidRequest("x".into()).is_unavailable());
    }

    #[test]
    fn test_auth_failure_classification() {
        let bad_key = ExchangeError::Api {
            status: 400,
            code: Some(-2014),
            message: "API-key format invalid.".into(),
        };
        assert!(bad_key.is_auth_failure());
        assert!(ExchangeError::MissingCredentials.is_auth_failure());
        assert!(!ExchangeError::CircuitOpen.is_auth_failure());
    }
}
