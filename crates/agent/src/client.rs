// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control-channel client loop.
//!
//! Obtain a bearer token (exponential backoff, cap 120 s), open the
//! channel (backoff cap 60 s), then consume deliveries one at a time:
//! handle, then ack. A 4001 close restarts from the auth step; anything
//! else reconnects with the same token. Every wait is interruptible by
//! the shutdown token at one-second granularity.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use warden_core::SystemClock;
use warden_wire::{decode_downstream, DownstreamFrame, ResponseMessage};

use crate::channel::Channel;
use crate::config::AgentConfig;
use crate::handlers::HandlerCtx;
use crate::registry::HandlerRegistry;
use crate::scheduler::Scheduler;

const AUTH_BACKOFF_CAP_SECS: u64 = 120;
const CONNECT_BACKOFF_CAP_SECS: u64 = 60;
const CLOSE_UNAUTHORIZED: u16 = 4001;

pub struct ClientDeps {
    pub config: AgentConfig,
    pub channel: Arc<Channel>,
    pub ctx: Arc<HandlerCtx>,
    pub registry: Arc<HandlerRegistry>,
    pub scheduler: Arc<Scheduler<SystemClock>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: String,
}

enum ServeEnd {
    Shutdown,
    AuthRejected,
    Lost,
}

/// Run the client until shutdown.
pub async fn run(deps: ClientDeps, shutdown: CancellationToken) {
    let http = reqwest::Client::new();
    'auth: while !shutdown.is_cancelled() {
        let Some(token) = obtain_token(&http, &deps.config, &shutdown).await else {
            break;
        };
        let mut attempt = 0u32;
        while !shutdown.is_cancelled() {
            match tokio_tungstenite::connect_async(deps.config.channel_url(&token)).await {
                Ok((ws, _)) => {
                    attempt = 0;
                    let end = serve(ws, &deps, &shutdown).await;
                    deps.channel.detach();
                    match end {
                        ServeEnd::Shutdown => break 'auth,
                        ServeEnd::AuthRejected => {
                            tracing::warn!("channel rejected the token, re-authenticating");
                            continue 'auth;
                        }
                        ServeEnd::Lost => tracing::warn!("control channel lost"),
                    }
                }
                Err(e) => tracing::error!(%e, "channel connect failed"),
            }
            attempt += 1;
            let wait = backoff_secs(attempt, CONNECT_BACKOFF_CAP_SECS);
            tracing::info!(wait, "retrying channel connect");
            interruptible_sleep(Duration::from_secs(wait), &shutdown).await;
        }
    }
    tracing::info!("client stopped");
}

/// Fetch a bearer token, retrying until it works or shutdown arrives.
async fn obtain_token(
    http: &reqwest::Client,
    config: &AgentConfig,
    shutdown: &CancellationToken,
) -> Option<String> {
    let mut attempt = 0u32;
    loop {
        if shutdown.is_cancelled() {
            return None;
        }
        let result = http
            .post(config.token_url())
            .json(&serde_json::json!({
                "system_uuid": config.system_uuid,
                "password": config.auth_password,
            }))
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<TokenResponse>().await {
                    Ok(token) => return Some(token.access_token),
                    Err(e) => tracing::error!(%e, "malformed token response"),
                }
            }
            Ok(resp) => tracing::error!(status = %resp.status(), "auth rejected"),
            Err(e) => tracing::error!(%e, "auth endpoint unreachable"),
        }
        attempt += 1;
        let wait = backoff_secs(attempt, AUTH_BACKOFF_CAP_SECS);
        tracing::info!(wait, "retrying auth");
        interruptible_sleep(Duration::from_secs(wait), shutdown).await;
    }
}

async fn serve<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    deps: &ClientDeps,
    shutdown: &CancellationToken,
) -> ServeEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    deps.channel.attach(tx);
    tracing::info!("control channel open");

    // Anything deferred while offline goes upstream first.
    deps.ctx.responder.flush_deferred();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                deps.channel.begin_close();
                while let Ok(text) = rx.try_recv() {
                    let _ = sink.send(Message::text(text)).await;
                }
                let _ = sink.send(Message::Close(None)).await;
                return ServeEnd::Shutdown;
            }
            Some(text) = rx.recv() => {
                if sink.send(Message::text(text)).await.is_err() {
                    return ServeEnd::Lost;
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_frame(deps, text.as_str()).await,
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code));
                    tracing::info!(?code, "channel closed by controller");
                    return if code == Some(CLOSE_UNAUTHORIZED) {
                        ServeEnd::AuthRejected
                    } else {
                        ServeEnd::Lost
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(%e, "channel read error");
                    return ServeEnd::Lost;
                }
                None => return ServeEnd::Lost,
            }
        }
    }
}

/// Handle one downstream frame; ack after the handler returns.
async fn handle_frame(deps: &ClientDeps, text: &str) {
    match decode_downstream(text) {
        Ok(DownstreamFrame::Delivery(delivery)) => {
            let tag = delivery.delivery_tag;
            if delivery.task.task_type.is_scheduled() {
                match deps.scheduler.accept(delivery.task) {
                    Ok(id) => tracing::info!(job = %id, "accepted scheduled task"),
                    Err(e) => tracing::error!(%e, "rejected scheduled task"),
                }
            } else {
                deps.registry.dispatch(deps.ctx.clone(), delivery.task, false).await;
            }
            ack(deps, tag);
        }
        Ok(DownstreamFrame::Unknown { delivery_tag, task_type }) => {
            tracing::warn!(%task_type, "unknown task type, ignoring");
            ack(deps, delivery_tag);
        }
        Err(e) => tracing::warn!(%e, "undecodable downstream frame"),
    }
}

fn ack(deps: &ClientDeps, delivery_tag: u64) {
    match warden_wire::encode(&ResponseMessage::Ack { delivery_tag }) {
        Ok(text) => {
            if deps.channel.send(text).is_err() {
                tracing::warn!(delivery_tag, "channel closed before ack; broker will redeliver");
            }
        }
        Err(e) => tracing::error!(%e, "failed to encode ack"),
    }
}

fn backoff_secs(attempt: u32, cap: u64) -> u64 {
    2u64.saturating_pow(attempt.min(16)).min(cap)
}

/// Sleep in one-second steps, returning early on shutdown.
pub async fn interruptible_sleep(duration: Duration, shutdown: &CancellationToken) {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if shutdown.is_cancelled() {
            return;
        }
        let step = remaining.min(Duration::from_secs(1));
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(step) => {}
        }
        remaining = remaining.saturating_sub(step);
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
