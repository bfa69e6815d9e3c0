// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation handlers.
//!
//! Each handler owns one downstream task type end to end: compute the
//! tool invocation, run it, emit the response (upstream or deferred), and
//! record command history in the local ledger when asked to.

pub mod cloud;
pub mod local;

use chrono::Utc;
use serde_json::Value;
use warden_core::{normalize, OpKind};
use warden_ledger::Ledger;
use warden_vault::Vault;
use warden_wire::TaskMessage;

use crate::executor::ToolConfig;
use crate::responder::Responder;

/// Shared context passed to every handler. Built once at startup.
pub struct HandlerCtx {
    pub ledger: Ledger,
    pub vault: Vault,
    pub responder: Responder,
    pub tool: ToolConfig,
}

/// Record an operation row when the task asked for command history.
///
/// Credentials are replaced by their ciphertext before normalization; if
/// encryption fails the row is dropped entirely — plaintext never reaches
/// the ledger.
pub(crate) fn record_history(ctx: &HandlerCtx, kind: OpKind, task: &TaskMessage, response: &Value) {
    if task.param_bool("command_history") != Some(true) {
        return;
    }
    let mut params = task.params_value();
    if let Err(e) = warden_vault::encrypt_params(&ctx.vault, &mut params) {
        tracing::error!(%e, table = kind.table(), "credential encryption failed, dropping history row");
        return;
    }
    let key = normalize(&params);
    match ctx.ledger.record_operation(kind, &key, response.clone(), Utc::now()) {
        Ok(true) => tracing::debug!(table = kind.table(), "recorded history row"),
        Ok(false) => {}
        Err(e) => tracing::error!(%e, table = kind.table(), "failed to record history row"),
    }
}

/// Fetch a required string parameter, logging when absent.
pub(crate) fn required<'a>(task: &'a TaskMessage, key: &str) -> Option<&'a str> {
    let value = task.param_str(key);
    if value.is_none() {
        tracing::error!(task = %task.task_type, key, "task is missing required parameter");
    }
    value
}
