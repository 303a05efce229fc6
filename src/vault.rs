//! Encryption of exchange secrets at rest
//!
//! Secrets are sealed with AES-256-GCM and stored as
//! `ENC:v1:<base64 nonce>:<base64 ciphertext>`. Optional associated data
//! (user id, exchange name) binds a ciphertext to the row it was written for,
//! so a secret copied onto another user's row fails to decrypt.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const STORAGE_PREFIX: &str = "ENC:v1:";
const STORAGE_DELIMITER: char = ':';
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed (wrong key or tampered value)")]
    DecryptionFailed,
    #[error("Invalid storage format")]
    InvalidStorageFormat,
}

/// Holds the data key; cheap to clone
#[derive(Clone)]
pub struct Vault {
    key: [u8; 32],
}

impl Vault {
    /// Build from configured key material.
    ///
    /// Accepts 32 raw bytes as base64 or 64 hex characters; any other string
    /// is treated as a passphrase and stretched with SHA-256.
    pub fn from_key_material(material: &str) -> Self {
        let material = material.trim();
        let key = decode_key(material).unwrap_or_else(|| {
            let mut key = [0u8; 32];
            key.copy_from_slice(&Sha256::digest(material.as_bytes()));
            key
        });
        Self { key }
    }

    /// Random process-local key. Secrets stored with it are unreadable after restart.
    pub fn ephemeral() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Use configured material when present, otherwise an ephemeral key with a warning
    pub fn from_config(material: Option<&str>) -> Self {
        match material.filter(|m| !m.trim().is_empty()) {
            Some(m) => Self::from_key_material(m),
            None => {
                tracing::warn!(
                    "No encryption key configured (DEEP_SIGNAL_ENCRYPTION_KEY); \
                     stored exchange secrets will not survive a restart"
                );
                Self::ephemeral()
            }
        }
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(STORAGE_PREFIX)
    }

    pub fn encrypt(&self, plaintext: &str, aad_parts: &[&str]) -> Result<String, VaultError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        if Self::is_encrypted(plaintext) {
            return Ok(plaintext.to_string());
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let aad = compose_aad(aad_parts);
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: &aad,
                },
            )
            .map_err(|_| VaultError::EncryptionFailed)?;

        Ok(format!(
            "{}{}{}{}",
            STORAGE_PREFIX,
            STANDARD.encode(nonce_bytes),
            STORAGE_DELIMITER,
            STANDARD.encode(ciphertext)
        ))
    }

    /// Decrypt a stored value. Values without the storage prefix are legacy
    /// plaintext and come back unchanged.
    pub fn decrypt(&self, stored: &str, aad_parts: &[&str]) -> Result<String, VaultError> {
        let Some(payload) = stored.strip_prefix(STORAGE_PREFIX) else {
            return Ok(stored.to_string());
        };

        let (nonce_b64, ciphertext_b64) = payload
            .split_once(STORAGE_DELIMITER)
            .ok_or(VaultError::InvalidStorageFormat)?;
        let nonce_bytes = STANDARD
            .decode(nonce_b64)
            .map_err(|_| VaultError::InvalidStorageFormat)?;
        let ciphertext = STANDARD
            .decode(ciphertext_b64)
            .map_err(|_| VaultError::InvalidStorageFormat)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(VaultError::InvalidStorageFormat);
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let aad = compose_aad(aad_parts);
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| VaultError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptionFailed)
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Vault { key: **** }")
    }
}

fn decode_key(material: &str) -> Option<[u8; 32]> {
    if material.len() == 64 {
        if let Ok(bytes) = hex::decode(material) {
            return bytes.try_into().ok();
        }
    }
    STANDARD
        .decode(material)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
}

fn compose_aad(parts: &[&str]) -> Vec<u8> {
    parts.join("|").into_bytes()
}

/// Mask an API key for display: first 4 + `****` + last 4. Keys of 8
/// characters or fewer are returned as-is.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return key.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}
