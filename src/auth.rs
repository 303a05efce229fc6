//! Registration, login and bearer tokens
//!
//! Passwords are hashed with bcrypt; access tokens are HS256 JWTs carrying the user's email and id.

use crate::store::{NewUser, Store, StoreError, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Token encoding failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
    })
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email_regex().is_match(email.trim()) {
        Ok(())
    } else {
        Err(AuthError::Validation("Invalid email format".to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Malformed hashes count as a mismatch
pub fn verify_password(password: &str, hashed: &str) -> bool {
    bcrypt::verify(password, hashed).unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email
    pub sub: String,
    pub uid: i64,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until expiry
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, user: &User) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.email.clone(),
            uid: user.id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(AccessToken {
            access_token: token,
            token_type: "bearer".to_string(),
            expires_in: self.ttl.num_seconds(),
        })
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                AuthError::InvalidToken
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Users, password hashing and token issuance behind one handle
#[derive(Debug, Clone)]
pub struct Authenticator {
    store: Store,
    tokens: TokenIssuer,
    bcrypt_cost: u32,
}

impl Authenticator {
    pub fn new(store: Store, tokens: TokenIssuer, bcrypt_cost: u32) -> Self {
        Self {
            store,
            tokens,
            bcrypt_cost,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn register(&self, req: &RegisterRequest) -> Result<User, AuthError> {
        validate_email(&req.email)?;
        validate_password(&req.password)?;

        if self.store.find_user_by_email(&req.email)?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let hashed = hash_password(&req.password, self.bcrypt_cost)?;
        let user = self
            .store
            .create_user(&NewUser {
                email: req.email.clone(),
                hashed_password: hashed,
                full_name: req.full_name.clone().filter(|n| !n.trim().is_empty()),
            })
            .map_err(|e| match e {
                StoreError::Duplicate(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        info!(user_id = user.id, email = %user.email, "User registered");
        Ok(user)
    }

    pub fn login(&self, req: &LoginRequest) -> Result<(User, AccessToken), AuthError> {
        let user = match self.store.find_user_by_email(&req.email)? {
            Some(user) => user,
            None => {
                debug!(email = %req.email, "Login for unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(&req.password, &user.hashed_password) {
            warn!(user_id = user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            warn!(user_id = user.id, "Login for inactive user");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(&user)?;
        info!(user_id = user.id, "User logged in");
        Ok((user, token))
    }

    /// Resolve a bearer token to an active user
    pub fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.tokens.validate(token)?;
        match self.store.find_user(claims.uid)? {
            Some(user) if user.is_active && user.email == claims.sub => Ok(user),
            _ => Err(AuthError::InvalidToken),
        }
    }
}
