//! Client address obfuscation
//!
//! The caller's network address is forwarded to the backend encrypted with
//! AES-256-CBC under a shared secret, so the backend can attribute traffic
//! without the address travelling in clear text. The output format is
//! `hex(iv):hex(ciphertext)` with a fresh random IV per call.
//!
//! A malformed secret never fails a request: the address is passed through
//! unchanged and the problem is logged.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// Well-known placeholder secret used when none is configured
pub const DEFAULT_ENCRYPTION_KEY: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

const KEY_HEX_LEN: usize = 64;
const IV_LEN: usize = 16;

/// Reasons a secret cannot be used as an AES-256 key
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("encryption key must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("encryption key contains non-hex characters")]
    NotHex,
}

/// Decode a 64-character hex secret into a 256-bit key
pub fn parse_secret(secret: &str) -> Result<[u8; 32], SecretError> {
    if secret.len() != KEY_HEX_LEN {
        return Err(SecretError::InvalidLength(secret.len()));
    }
    let mut key = [0u8; 32];
    hex::decode_to_slice(secret, &mut key).map_err(|_| SecretError::NotHex)?;
    Ok(key)
}

/// Encrypt an address under `secret`, or return it unchanged if the secret is malformed
pub fn encode(address: &str, secret: &str) -> String {
    match parse_secret(secret) {
        Ok(key) => encrypt(address, &key),
        Err(e) => {
            tracing::error!(error = %e, "Invalid client IP encryption key, forwarding address unencrypted");
            address.to_string()
        }
    }
}

fn encrypt(address: &str, key: &[u8; 32]) -> String {
    let iv: [u8; IV_LEN] = rand::random();
    let ciphertext =
        Aes256CbcEnc::new(&(*key).into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(address.as_bytes());
    format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
}

// ============================================================================
// Client IP Cipher
// ============================================================================

/// Address encoder holding a secret resolved once at startup
///
/// The secret is validated on construction, so a misconfiguration is logged
/// once instead of on every request.
#[derive(Clone)]
pub struct ClientIpCipher {
    key: Option<[u8; 32]>,
}

impl ClientIpCipher {
    pub fn new(secret: &str) -> Self {
        if secret.eq_ignore_ascii_case(DEFAULT_ENCRYPTION_KEY) {
            tracing::warn!(
                "Using the default client IP encryption key. Set CLIENT_IP_ENCRYPTION_KEY in production."
            );
        }

        let key = match parse_secret(secret) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Invalid CLIENT_IP_ENCRYPTION_KEY, client addresses will be forwarded unencrypted"
                );
                None
            }
        };

        Self { key }
    }

    /// Whether addresses are actually encrypted
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    pub fn encode(&self, address: &str) -> String {
        match &self.key {
            Some(key) => encrypt(address, key),
            None => address.to_string(),
        }
    }
}

impl Default for ClientIpCipher {
    fn default() -> Self {
        Self::new(DEFAULT_ENCRYPTION_KEY)
    }
}

impl std::fmt::Debug for ClientIpCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIpCipher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
