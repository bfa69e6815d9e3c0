// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller side of the agent control channel.
//!
//! Channel opens are rejected with 4001 (bad token, missing org) or 4000
//! (work-queue broker unavailable). An accepted channel records the
//! liveness transition, declares the agent's durable inbox, and runs two
//! duties in one loop: pumping inbox deliveries downstream (one in
//! flight until acked) and dispatching upstream responses into the
//! result store. On close the liveness flips to disconnected and the
//! inbox is force-deleted, best effort.

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthService;
use crate::broker::Broker;
use crate::dispatch::Mutations;
use crate::liveness::LivenessStore;
use crate::queries::Queries;
use crate::results::ResultStore;

pub const CLOSE_BROKER_DOWN: u16 = 4000;
pub const CLOSE_UNAUTHORIZED: u16 = 4001;

/// Shared controller context for the HTTP and channel handlers.
pub struct ConnCtx {
    pub broker: Option<Arc<Broker>>,
    pub liveness: LivenessStore,
    pub results: ResultStore,
    pub auth: Arc<AuthService>,
    pub mutations: Arc<Mutations>,
    pub queries: Queries,
    pub shutdown: CancellationToken,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(system_uuid): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(ctx): State<Arc<ConnCtx>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_channel(socket, system_uuid, params, ctx))
}

async fn handle_channel(
    socket: WebSocket,
    system_uuid: String,
    params: HashMap<String, String>,
    ctx: Arc<ConnCtx>,
) {
    let token_valid = params
        .get("token")
        .and_then(|t| ctx.auth.verify(t))
        .map(|claims| claims.sub == system_uuid)
        .unwrap_or(false);
    if !token_valid {
        tracing::warn!(%system_uuid, "channel denied: invalid token");
        close(socket, CLOSE_UNAUTHORIZED, "unauthorized").await;
        return;
    }
    let Some(org) = params.get("org").cloned().filter(|o| !o.is_empty()) else {
        tracing::warn!(%system_uuid, "channel denied: missing org");
        close(socket, CLOSE_UNAUTHORIZED, "org required").await;
        return;
    };
    let Some(broker) = ctx.broker.clone() else {
        tracing::warn!(%system_uuid, "channel denied: broker unavailable");
        close(socket, CLOSE_BROKER_DOWN, "broker unavailable").await;
        return;
    };
    if let Err(e) = broker.declare(&system_uuid) {
        tracing::error!(%e, %system_uuid, "inbox declare failed");
        close(socket, CLOSE_BROKER_DOWN, "broker unavailable").await;
        return;
    }
    if let Err(e) = ctx.liveness.on_connect(&system_uuid, &org, Utc::now()) {
        tracing::error!(%e, %system_uuid, "failed to record connection");
    }
    tracing::info!(%system_uuid, %org, "agent connected");

    let notify = broker.notify_handle(&system_uuid);
    let (mut sink, mut stream) = socket.split();

    loop {
        // Deliver the inbox head unless a message is already in flight.
        if let Some(pending) = broker.next_ready(&system_uuid) {
            let frame = delivery_frame(pending.delivery_tag, pending.body);
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
            continue;
        }
        tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            _ = wait_notified(&notify) => {}
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_upstream(&ctx, &broker, &system_uuid, &org, text.as_str());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(%e, %system_uuid, "channel read error");
                    break;
                }
            }
        }
    }

    if let Err(e) = ctx.liveness.on_disconnect(&system_uuid, Utc::now()) {
        tracing::error!(%e, %system_uuid, "failed to record disconnection");
    }
    if let Err(e) = broker.delete(&system_uuid) {
        tracing::error!(%e, %system_uuid, "failed to delete inbox");
    }
    tracing::info!(%system_uuid, "agent disconnected");
}

/// Route one upstream frame: acks complete deliveries, everything else
/// goes to the result store by its `type`.
fn handle_upstream(ctx: &ConnCtx, broker: &Broker, system_uuid: &str, org: &str, text: &str) {
    match warden_wire::decode_response(text) {
        Ok(warden_wire::ResponseMessage::Ack { delivery_tag }) => {
            if let Err(e) = broker.ack(system_uuid, delivery_tag) {
                tracing::warn!(%e, %system_uuid, delivery_tag, "ack failed");
            }
        }
        Ok(msg) => {
            tracing::info!(%system_uuid, kind = msg.type_name(), "response received");
            ctx.results.handle(Some(system_uuid), org, &msg, Utc::now());
        }
        Err(e) => {
            tracing::warn!(%e, %system_uuid, "unknown message type, ignoring");
        }
    }
}

fn delivery_frame(delivery_tag: u64, body: Value) -> String {
    let mut body = body;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("delivery_tag".into(), Value::from(delivery_tag));
    }
    body.to_string()
}

async fn wait_notified(notify: &Option<Arc<tokio::sync::Notify>>) {
    match notify {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}

async fn close(mut socket: WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame { code, reason: Utf8Bytes::from_static(reason) };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

#[cfg(test)]
#[path = "conn_tests.rs"]
mod tests;
