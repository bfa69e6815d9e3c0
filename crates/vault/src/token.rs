// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key derivation and the authenticated token format.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use std::path::Path;
use thiserror::Error;

/// Token version prefix. Bump when the KDF or cipher parameters change;
/// decryption dispatches on the prefix so existing tokens keep working.
pub const TOKEN_PREFIX: &str = "wv1.";

const SALT_FILE: &str = "vault.salt";
const SALT_LEN: usize = 16;
const KDF_ITERATIONS: u32 = 120_000;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("salt io error: {0}")]
    SaltIo(#[from] std::io::Error),

    #[error("salt file is corrupt ({0} bytes, expected {SALT_LEN})")]
    SaltCorrupt(usize),

    #[error("unrecognized token version")]
    UnknownVersion,

    #[error("token is not valid base64")]
    Encoding,

    #[error("token is truncated")]
    Truncated,

    #[error("decryption failed (wrong key or tampered token)")]
    Decrypt,

    #[error("encryption failed")]
    Encrypt,
}

/// Handle to the derived key. Construct once at startup and pass by
/// reference; there is no global cipher state.
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    /// Open the vault for a state directory, creating and persisting the
    /// per-installation salt on first use.
    pub fn open(state_dir: &Path, passphrase: &str) -> Result<Self, VaultError> {
        let salt = load_or_create_salt(state_dir)?;
        Ok(Self::with_salt(passphrase, &salt))
    }

    /// Derive the key from an explicit salt. Exposed for tests and for
    /// callers that manage salt persistence themselves.
    pub fn with_salt(passphrase: &str, salt: &[u8]) -> Self {
        let mut key_bytes = [0u8; 32];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, KDF_ITERATIONS, &mut key_bytes);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        Self { cipher }
    }

    /// Encrypt a plaintext into a versioned, self-describing token.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::Encrypt)?;
        let mut body = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&ciphertext);
        Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(body)))
    }

    /// Decrypt a token produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, token: &str) -> Result<String, VaultError> {
        let body = token.strip_prefix(TOKEN_PREFIX).ok_or(VaultError::UnknownVersion)?;
        let raw = URL_SAFE_NO_PAD.decode(body).map_err(|_| VaultError::Encoding)?;
        if raw.len() <= NONCE_LEN {
            return Err(VaultError::Truncated);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| VaultError::Decrypt)
    }

    /// Whether a string looks like one of our tokens.
    pub fn is_token(value: &str) -> bool {
        value.starts_with(TOKEN_PREFIX)
    }
}

fn load_or_create_salt(state_dir: &Path) -> Result<Vec<u8>, VaultError> {
    let path = state_dir.join(SALT_FILE);
    if path.exists() {
        let salt = std::fs::read(&path)?;
        if salt.len() != SALT_LEN {
            return Err(VaultError::SaltCorrupt(salt.len()));
        }
        return Ok(salt);
    }
    std::fs::create_dir_all(state_dir)?;
    let mut salt = vec![0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    std::fs::write(&path, &salt)?;
    tracing::info!(path = %path.display(), "created vault salt");
    Ok(salt)
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
