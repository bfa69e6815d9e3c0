// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application of the vault to parameter objects.
//!
//! The credential field set is closed: exactly these keys are encrypted
//! before persistence and before normalization. Empty strings are left
//! alone. A failure to encrypt any field aborts the whole operation —
//! plaintext never falls through to storage.

use crate::token::{Vault, VaultError};
use serde_json::Value;

/// The closed set of credential field names.
pub const CREDENTIAL_FIELDS: [&str; 4] =
    ["password", "aws_access_key_id", "aws_secret_access_key", "aws_session_token"];

/// Encrypt every credential field in `params`, recursively.
///
/// Values already in token form are left untouched so the transform is
/// idempotent across retries.
pub fn encrypt_params(vault: &Vault, params: &mut Value) -> Result<(), VaultError> {
    walk(params, &mut |key, value| {
        if !CREDENTIAL_FIELDS.contains(&key) {
            return Ok(());
        }
        if let Value::String(s) = value {
            if s.is_empty() || Vault::is_token(s) {
                return Ok(());
            }
            *value = Value::String(vault.encrypt(s)?);
        }
        Ok(())
    })
}

/// Decrypt every credential field in `params`, recursively.
pub fn decrypt_params(vault: &Vault, params: &mut Value) -> Result<(), VaultError> {
    walk(params, &mut |key, value| {
        if !CREDENTIAL_FIELDS.contains(&key) {
            return Ok(());
        }
        if let Value::String(s) = value {
            if Vault::is_token(s) {
                *value = Value::String(vault.decrypt(s)?);
            }
        }
        Ok(())
    })
}

fn walk(
    value: &mut Value,
    f: &mut impl FnMut(&str, &mut Value) -> Result<(), VaultError>,
) -> Result<(), VaultError> {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                f(key, v)?;
                walk(v, f)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                walk(v, f)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "fields_tests.rs"]
mod tests;
