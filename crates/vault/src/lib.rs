// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-vault: symmetric encryption of credential fields at rest.
//!
//! A 32-byte key is derived from a configured passphrase with
//! PBKDF2-HMAC-SHA256 over a per-installation salt persisted next to the
//! store. Ciphertext tokens are authenticated (AES-256-GCM), versioned,
//! and carry their own nonce, so tampered input fails decryption and the
//! KDF parameters can rotate without orphaning old tokens.

mod fields;
mod token;

pub use fields::{decrypt_params, encrypt_params, CREDENTIAL_FIELDS};
pub use token::{Vault, VaultError, TOKEN_PREFIX};
