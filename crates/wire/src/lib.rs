// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire schema for the controller ↔ agent control channel.
//!
//! All frames are JSON text. Downstream frames wrap a task message in a
//! delivery envelope (`delivery_tag`); upstream frames are response
//! messages, including the `ack` that completes a delivery.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod envelope;
mod response;
mod summary;
mod task;

pub use envelope::{decode_downstream, Delivery, DownstreamFrame};
pub use response::{decode_response, ResponseMessage, TaskStatus};
pub use summary::{BackupSummary, RestoreSummary, Snapshot};
pub use task::{TaskMessage, TaskType};

use thiserror::Error;

/// Wire-level failures.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("frame is missing field `{0}`")]
    MissingField(&'static str),
}

/// Serialize any wire message to its JSON text form.
pub fn encode<T: serde::Serialize>(msg: &T) -> Result<String, WireError> {
    Ok(serde_json::to_string(msg)?)
}
