//! Request signing for Binance signed endpoints
//!
//! Binance signs the exact query string (including `timestamp`) with
//! HMAC-SHA256 keyed by the API secret; the hex digest is appended as the
//! `signature` parameter and the key travels in the `X-MBX-APIKEY` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use super::error::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key on signed requests
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Hex encoded HMAC-SHA256 of `payload` keyed by `secret`
pub fn sign_query(payload: &str, secret: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// API credentials for one exchange account
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    pub fn sign(&self, payload: &str) -> Result<String, ExchangeError> {
        sign_query(payload, &self.api_secret)
    }
}

// Secrets never reach logs through Debug
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &crate::vault::mask_api_key(&self.api_key))
            .field("api_secret", &"****")
            .finish()
    }
}
