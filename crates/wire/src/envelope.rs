// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery envelope for downstream frames.
//!
//! The broker assigns each published message a per-inbox monotonically
//! increasing `delivery_tag`; the agent acks the tag after its handler
//! returns, which releases the next message (prefetch = 1).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{TaskMessage, WireError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub delivery_tag: u64,
    #[serde(flatten)]
    pub task: TaskMessage,
}

/// A decoded downstream frame.
///
/// Unknown task types still carry a usable tag so the consumer can log,
/// ack, and move on without wedging the inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum DownstreamFrame {
    Delivery(Delivery),
    Unknown { delivery_tag: u64, task_type: String },
}

/// Decode a downstream frame, tolerating unknown task types.
pub fn decode_downstream(text: &str) -> Result<DownstreamFrame, WireError> {
    let value: Value = serde_json::from_str(text)?;
    let delivery_tag = value
        .get("delivery_tag")
        .and_then(Value::as_u64)
        .ok_or(WireError::MissingField("delivery_tag"))?;
    let task_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(WireError::MissingField("type"))?
        .to_string();

    match serde_json::from_value::<Delivery>(value) {
        Ok(delivery) => Ok(DownstreamFrame::Delivery(delivery)),
        Err(_) => Ok(DownstreamFrame::Unknown { delivery_tag, task_type }),
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
