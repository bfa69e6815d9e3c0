// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token issue and verification.
//!
//! Stateless: tokens are signed HS256 JWTs carrying `sub` (the agent's
//! system UUID) and `exp`. There is no refresh endpoint; agents
//! re-authenticate when a channel open is rejected.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    agent_password: String,
    ttl: Duration,
}

impl AuthService {
    pub fn new(secret: &str, agent_password: String, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            agent_password,
            ttl,
        }
    }

    /// Check enrollment credentials presented to `/token`.
    pub fn check_credentials(&self, password: &str) -> bool {
        !self.agent_password.is_empty() && password == self.agent_password
    }

    /// Issue a token for an authenticated agent.
    pub fn issue(&self, system_uuid: &str) -> Result<String, AuthError> {
        let exp = (Utc::now().timestamp() as u64).saturating_add(self.ttl.as_secs());
        let claims = Claims { sub: system_uuid.to_string(), exp };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify a presented token. Expired, malformed, or mis-signed
    /// tokens return `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .ok()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
