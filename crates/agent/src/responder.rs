// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response emission.
//!
//! A response goes upstream when the task was an ordinary dispatch and the
//! channel is open; otherwise it materializes as a pending row in the
//! schedule ledger. Pending rows are flushed upstream on the next
//! successful channel open.

use chrono::Utc;
use std::sync::Arc;
use warden_ledger::{Ledger, ScheduleStatus};
use warden_wire::ResponseMessage;

use crate::channel::Channel;

#[derive(Clone)]
pub struct Responder {
    channel: Arc<Channel>,
    ledger: Ledger,
}

impl Responder {
    pub fn new(channel: Arc<Channel>, ledger: Ledger) -> Self {
        Self { channel, ledger }
    }

    /// Emit a response for a task. `scheduled` is true when the task
    /// arrived as a `schedule_*` variant (its responses always defer).
    pub fn emit(&self, scheduled: bool, msg: &ResponseMessage) {
        if !scheduled {
            match warden_wire::encode(msg) {
                Ok(text) => {
                    if self.channel.send(text).is_ok() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(%e, "failed to serialize response");
                    return;
                }
            }
        }
        self.defer(msg);
    }

    /// Write a response into the schedule ledger for later flushing.
    fn defer(&self, msg: &ResponseMessage) {
        let payload = match serde_json::to_value(msg) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(%e, "failed to serialize deferred response");
                return;
            }
        };
        match self.ledger.push_schedule_row(payload, ScheduleStatus::Pending, Utc::now()) {
            Ok(id) => {
                tracing::info!(row = %id, kind = msg.type_name(), "deferred response to ledger")
            }
            Err(e) => tracing::error!(%e, "failed to defer response"),
        }
    }

    /// Send every pending deferred response upstream, marking flushed rows
    /// done. Called after each successful channel open.
    pub fn flush_deferred(&self) {
        for row in self.ledger.schedule_rows(ScheduleStatus::Pending) {
            let is_response = row
                .payload
                .get("type")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|t| t.starts_with("response_"));
            if !is_response {
                continue;
            }
            let text = match serde_json::to_string(&row.payload) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if self.channel.send(text).is_err() {
                // Channel dropped mid-flush; the rest stays pending.
                return;
            }
            if let Err(e) = self.ledger.mark_schedule_row(&row.id, ScheduleStatus::Done) {
                tracing::warn!(%e, row = %row.id, "flushed response but could not mark row");
            }
            tracing::info!(row = %row.id, "flushed deferred response");
        }
    }
}

#[cfg(test)]
#[path = "responder_tests.rs"]
mod tests;
