// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! warden-agent binary: wires the ledger, vault, scheduler, and control
//! channel client together and runs until SIGINT/SIGTERM.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use warden_agent::{
    client, AgentConfig, Channel, HandlerCtx, HandlerRegistry, Responder, Scheduler, ToolConfig,
};
use warden_core::SystemClock;
use warden_ledger::Ledger;
use warden_vault::Vault;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AgentConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(%e, "invalid agent configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(system_uuid = %config.system_uuid, org = %config.org, "agent starting");

    let ledger = match Ledger::open(&config.state_dir.join("ledger")) {
        Ok(ledger) => ledger,
        Err(e) => {
            tracing::error!(%e, "cannot open local ledger");
            std::process::exit(1);
        }
    };
    let vault = match Vault::open(&config.state_dir, &config.vault_passphrase) {
        Ok(vault) => vault,
        Err(e) => {
            tracing::error!(%e, "cannot open credential vault");
            std::process::exit(1);
        }
    };

    let channel = Arc::new(Channel::new());
    let responder = Responder::new(channel.clone(), ledger.clone());
    let ctx = Arc::new(HandlerCtx {
        ledger: ledger.clone(),
        vault,
        responder,
        tool: ToolConfig { bin: config.tool_bin.clone(), timeout: config.tool_timeout },
    });
    let registry = Arc::new(HandlerRegistry::build());
    let scheduler = Arc::new(Scheduler::new(ledger, registry.clone(), ctx.clone(), SystemClock));

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    client::run(
        client::ClientDeps { config, channel, ctx, registry, scheduler },
        shutdown.clone(),
    )
    .await;

    let _ = scheduler_task.await;
    tracing::info!("agent stopped");
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(%e, "cannot install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });
}
