// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the controller.

use std::path::PathBuf;
use std::time::Duration;

/// Resolve state directory: WARDEN_STATE_DIR > XDG_STATE_HOME/warden >
/// ~/.local/state/warden.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("WARDEN_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("warden"));
    }
    dirs::home_dir().map(|home| home.join(".local/state/warden"))
}

/// HTTP/WS bind address.
pub fn bind_addr() -> String {
    std::env::var("WARDEN_BIND").unwrap_or_else(|_| "0.0.0.0:5000".to_string())
}

/// JWT signing secret. Required in production; the dev fallback keeps
/// single-machine setups running.
pub fn auth_secret() -> String {
    std::env::var("WARDEN_AUTH_SECRET").unwrap_or_else(|_| {
        tracing::warn!("WARDEN_AUTH_SECRET not set, using development secret");
        "warden-dev-secret".to_string()
    })
}

/// Passphrase for the controller vault (broker spool encryption). Falls
/// back to the auth secret for single-machine setups.
pub fn vault_passphrase() -> String {
    std::env::var("WARDEN_VAULT_PASSPHRASE").unwrap_or_else(|_| auth_secret())
}

/// Shared agent-enrollment password checked by the token endpoint.
pub fn agent_password() -> Option<String> {
    std::env::var("WARDEN_AGENT_PASSWORD").ok().filter(|s| !s.is_empty())
}

/// Bearer token lifetime (default 30 minutes).
pub fn token_ttl() -> Duration {
    std::env::var("WARDEN_TOKEN_TTL_MINUTES")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(|m| Duration::from_secs(m * 60))
        .unwrap_or(Duration::from_secs(30 * 60))
}

/// Retention window for cached snapshot/backup documents. The 60-second
/// default mirrors the development setting; production deploys raise it.
pub fn retention() -> Duration {
    std::env::var("WARDEN_RETENTION_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(60))
}

/// DR policy document path.
pub fn dr_policy_path() -> PathBuf {
    std::env::var("WARDEN_DR_POLICY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("dr_policy.json5"))
}

/// Backup tool binary for controller-side cloud operations.
pub fn tool_bin() -> PathBuf {
    std::env::var("WARDEN_TOOL_BIN")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("restic"))
}

/// Subprocess timeout for controller-side cloud operations.
pub fn tool_timeout() -> Duration {
    std::env::var("WARDEN_TOOL_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(3600))
}
