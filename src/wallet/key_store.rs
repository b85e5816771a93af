//! Owned, wipeable storage for the signing secret.
//!
//! The secret lives in a mutable byte buffer for exactly one pipeline run. It is
//! never kept as a `String`, never logged, and is overwritten before the buffer is
//! released, either explicitly through [`SecureKeyStore::wipe`] or when the store is
//! dropped on an error or panic path.

use rand::RngCore;
use secrecy::zeroize::Zeroize;
use std::{fmt, hint::black_box};

use crate::error::{Result, WalletError};

const HEX_PREFIX: &[u8] = b"0x";

/// Holds a hex-encoded private key until it is wiped.
pub struct SecureKeyStore {
    buffer: Option<Vec<u8>>,
}

impl SecureKeyStore {
    /// Takes ownership of the raw secret, normalizes it to a `0x`-prefixed form and
    /// zeroizes the string it came in.
    pub fn store(mut raw_secret: String) -> Result<Self> {
        let trimmed = raw_secret.trim();
        if trimmed.is_empty() {
            raw_secret.zeroize();
            return Err(WalletError::KeyError("private key is empty".to_string()));
        }

        let has_prefix = trimmed.starts_with("0x") || trimmed.starts_with("0X");
        let body = if has_prefix { &trimmed[2..] } else { trimmed };

        let mut buffer = Vec::with_capacity(HEX_PREFIX.len() + body.len());
        buffer.extend_from_slice(HEX_PREFIX);
        buffer.extend_from_slice(body.as_bytes());

        raw_secret.zeroize();
        Ok(Self {
            buffer: Some(buffer),
        })
    }

    /// Returns the normalized secret bytes.
    pub fn read(&self) -> Result<&[u8]> {
        self.buffer
            .as_deref()
            .ok_or_else(|| WalletError::KeyError("private key has already been wiped".to_string()))
    }

    /// Returns the normalized secret as text.
    pub fn read_str(&self) -> Result<&str> {
        std::str::from_utf8(self.read()?)
            .map_err(|_| WalletError::KeyError("private key is not valid UTF-8".to_string()))
    }

    /// Overwrites the secret with zeros, ones, random bytes and zeros again, then
    /// releases it. Calls after the first one do nothing.
    pub fn wipe(&mut self) {
        let Some(mut buffer) = self.buffer.take() else {
            return;
        };

        buffer.fill(0x00);
        black_box(buffer.as_slice());
        buffer.fill(0xFF);
        black_box(buffer.as_slice());
        rand::rng().fill_bytes(&mut buffer);
        black_box(buffer.as_slice());
        buffer.zeroize();

        tracing::debug!("Private key buffer wiped");
    }

    pub fn is_wiped(&self) -> bool {
        self.buffer.is_none()
    }
}

impl Drop for SecureKeyStore {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for SecureKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureKeyStore")
            .field("secret", &"[REDACTED]")
            .field("wiped", &self.is_wiped())
            .finish()
    }
}
