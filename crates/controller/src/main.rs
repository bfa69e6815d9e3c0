// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wardend: the controller daemon.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use warden_controller::dispatch::DispatchRestoreWorkflow;
use warden_controller::dr::{DrMonitor, DrPolicy};
use warden_controller::{http, lifecycle};
use warden_core::SystemClock;

#[tokio::main]
async fn main() {
    let config = match lifecycle::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("wardend: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config);

    let shutdown = CancellationToken::new();
    let daemon = match lifecycle::startup(&config, shutdown.clone()) {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(%e, "startup failed");
            std::process::exit(1);
        }
    };
    spawn_signal_handler(shutdown.clone());

    // Background sweep for cached snapshot/backup documents.
    let sweep = {
        let results = daemon.results.clone();
        let retention = config.retention;
        let shutdown = shutdown.clone();
        tokio::spawn(async move { results.sweep_loop(retention, shutdown).await })
    };

    // DR monitor; an invalid policy stops only this subsystem.
    let dr_task = match DrPolicy::load(&config.dr_policy_path) {
        Ok(policy) => {
            let monitor = DrMonitor::new(
                policy,
                daemon.liveness.clone(),
                Arc::new(DispatchRestoreWorkflow::new(daemon.mutations.clone())),
                SystemClock,
            );
            let shutdown = shutdown.clone();
            Some(tokio::spawn(async move { monitor.run(shutdown).await }))
        }
        Err(e) => {
            tracing::error!(%e, "DR policy rejected; monitor will not start");
            None
        }
    };

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%e, addr = %config.bind_addr, "cannot bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %config.bind_addr, "controller listening");

    let app = http::router(daemon.ctx.clone());
    let serve_shutdown = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await;
    if let Err(e) = result {
        tracing::error!(%e, "server error");
    }

    shutdown.cancel();
    let _ = sweep.await;
    if let Some(task) = dr_task {
        let _ = task.await;
    }
    tracing::info!("controller stopped");
}

fn init_tracing(config: &lifecycle::Config) {
    let filter =
        EnvFilter::try_from_env("WARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let logs_dir = config.state_dir.join("logs");
    match std::fs::create_dir_all(&logs_dir) {
        Ok(()) => {
            let file = tracing_appender::rolling::daily(&logs_dir, "wardend.log");
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
                .init();
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
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
