// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration: a small TOML file with env-var overrides.
//!
//! The config file carries the agent's identity (`system_uuid`, `org`) and
//! the controller endpoints; every field can be overridden with a
//! `WARDEN_AGENT_*` environment variable for containerized deployments.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} not readable: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("config file {0} is not valid TOML: {1}")]
    Toml(PathBuf, toml::de::Error),

    #[error("config is missing `{0}` (file key or WARDEN_AGENT_{1})")]
    Missing(&'static str, &'static str),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    system_uuid: Option<String>,
    org: Option<String>,
    controller_http: Option<String>,
    controller_ws: Option<String>,
    auth_password: Option<String>,
    vault_passphrase: Option<String>,
    state_dir: Option<PathBuf>,
    tool_bin: Option<PathBuf>,
    tool_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_uuid: String,
    pub org: String,
    /// Base URL for the auth endpoint, e.g. `http://controller:5000`.
    pub controller_http: String,
    /// Base URL for the control channel, e.g. `ws://controller:5000`.
    pub controller_ws: String,
    pub auth_password: String,
    pub vault_passphrase: String,
    pub state_dir: PathBuf,
    pub tool_bin: PathBuf,
    pub tool_timeout: Duration,
}

impl AgentConfig {
    /// Load from `WARDEN_AGENT_CONFIG` (default `agent.toml`), then apply
    /// env overrides. A missing file is fine when env vars cover the
    /// required fields.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WARDEN_AGENT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("agent.toml"));
        let raw = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::Io(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::Toml(path.clone(), e))?
        } else {
            RawConfig::default()
        };
        Self::from_raw(raw)
    }

    /// Parse a config document directly (no env overrides). For tests.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|e| ConfigError::Toml(path.to_path_buf(), e))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let pick = |env_suffix: &str, file_value: Option<String>| -> Option<String> {
            std::env::var(format!("WARDEN_AGENT_{env_suffix}")).ok().or(file_value)
        };

        let system_uuid = pick("SYSTEM_UUID", raw.system_uuid)
            .ok_or(ConfigError::Missing("system_uuid", "SYSTEM_UUID"))?;
        let org = pick("ORG", raw.org).ok_or(ConfigError::Missing("org", "ORG"))?;
        let controller_http = pick("CONTROLLER_HTTP", raw.controller_http)
            .unwrap_or_else(|| "http://localhost:5000".to_string());
        let controller_ws = pick("CONTROLLER_WS", raw.controller_ws)
            .unwrap_or_else(|| "ws://localhost:5000".to_string());
        let auth_password = pick("AUTH_PASSWORD", raw.auth_password)
            .ok_or(ConfigError::Missing("auth_password", "AUTH_PASSWORD"))?;
        let vault_passphrase = pick("VAULT_PASSPHRASE", raw.vault_passphrase)
            .unwrap_or_else(|| auth_password.clone());
        let state_dir = pick("STATE_DIR", raw.state_dir.map(|p| p.display().to_string()))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("warden-agent-state"));
        let tool_bin = pick("TOOL_BIN", raw.tool_bin.map(|p| p.display().to_string()))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("restic"));
        let tool_timeout = pick("TOOL_TIMEOUT_SECS", raw.tool_timeout_secs.map(|n| n.to_string()))
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));

        Ok(Self {
            system_uuid,
            org,
            controller_http,
            controller_ws,
            auth_password,
            vault_passphrase,
            state_dir,
            tool_bin,
            tool_timeout,
        })
    }

    /// The control-channel URL for this agent.
    pub fn channel_url(&self, token: &str) -> String {
        format!(
            "{}/ws/{}?token={}&org={}",
            self.controller_ws, self.system_uuid, token, self.org
        )
    }

    /// The token endpoint URL.
    pub fn token_url(&self) -> String {
        format!("{}/token", self.controller_http)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
