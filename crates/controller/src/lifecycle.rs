// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller startup: state directory, lock file, service objects.
//!
//! All stores are explicit service objects built here and passed by
//! reference; there is no import-time state. A dead broker directory is
//! not fatal — the controller runs degraded and rejects channel opens
//! with close code 4000 until restarted with a healthy spool.

use fs2::FileExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthService;
use crate::broker::Broker;
use crate::conn::ConnCtx;
use crate::dispatch::Mutations;
use crate::docstore::DocStore;
use crate::env;
use crate::liveness::LivenessStore;
use crate::queries::Queries;
use crate::results::ResultStore;
use crate::s3ops::S3Ops;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no usable state directory (set WARDEN_STATE_DIR)")]
    NoStateDir,

    #[error("io error during startup: {0}")]
    Io(#[from] std::io::Error),

    #[error("another controller holds the state lock: {0}")]
    LockFailed(std::io::Error),

    #[error("document store failed to open: {0}")]
    Store(#[from] crate::docstore::StoreError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub bind_addr: String,
    pub auth_secret: String,
    pub vault_passphrase: String,
    pub agent_password: String,
    pub token_ttl: Duration,
    pub retention: Duration,
    pub dr_policy_path: PathBuf,
    pub tool_bin: PathBuf,
    pub tool_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir().ok_or(LifecycleError::NoStateDir)?;
        let agent_password = env::agent_password().unwrap_or_else(|| {
            tracing::warn!("WARDEN_AGENT_PASSWORD not set; token requests will be rejected");
            String::new()
        });
        Ok(Self {
            state_dir,
            bind_addr: env::bind_addr(),
            auth_secret: env::auth_secret(),
            vault_passphrase: env::vault_passphrase(),
            agent_password,
            token_ttl: env::token_ttl(),
            retention: env::retention(),
            dr_policy_path: env::dr_policy_path(),
            tool_bin: env::tool_bin(),
            tool_timeout: env::tool_timeout(),
        })
    }
}

pub struct Daemon {
    pub ctx: Arc<ConnCtx>,
    pub results: ResultStore,
    pub liveness: LivenessStore,
    pub mutations: Arc<Mutations>,
    // Held for the process lifetime; releasing it drops the lock.
    _lock_file: std::fs::File,
}

/// Assemble the controller's service objects.
pub fn startup(config: &Config, shutdown: CancellationToken) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let lock_path = config.state_dir.join("wardend.lock");
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let store = Arc::new(DocStore::open(&config.state_dir.join("docs"))?);
    let liveness = LivenessStore::new(store.clone());
    let results = ResultStore::new(store.clone());

    let broker = warden_vault::Vault::open(&config.state_dir, &config.vault_passphrase)
        .map_err(|e| {
            tracing::error!(%e, "controller vault unavailable");
        })
        .ok()
        .and_then(|vault| {
            match Broker::open(&config.state_dir.join("broker"), vault) {
                Ok(broker) => Some(Arc::new(broker)),
                Err(e) => {
                    tracing::error!(%e, "work-queue broker unavailable; channels will be rejected");
                    None
                }
            }
        });

    let s3 = Arc::new(S3Ops::new(
        config.tool_bin.clone(),
        config.tool_timeout,
        results.clone(),
    ));
    let mutations = Arc::new(Mutations::new(broker.clone(), liveness.clone(), s3));
    let auth = Arc::new(AuthService::new(
        &config.auth_secret,
        config.agent_password.clone(),
        config.token_ttl,
    ));
    let queries = Queries::new(store, liveness.clone());

    let ctx = Arc::new(ConnCtx {
        broker,
        liveness: liveness.clone(),
        results: results.clone(),
        auth,
        mutations: mutations.clone(),
        queries,
        shutdown,
    });

    Ok(Daemon { ctx, results, liveness, mutations, _lock_file: lock_file })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
