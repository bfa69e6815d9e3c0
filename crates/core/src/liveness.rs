// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent liveness records.
//!
//! Written only by the controller's connection manager on channel
//! transitions; read by the query surface and the DR monitor. After any
//! transition the record's status and timestamps agree: a connected record
//! has `connected_at >= last_disconnected_at`, a disconnected record has
//! `last_disconnected_at > connected_at` (or no `connected_at` at all).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessRecord {
    pub system_uuid: String,
    pub org: String,
    pub status: ConnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_disconnected_at: Option<DateTime<Utc>>,
}

impl LivenessRecord {
    /// Fresh record for an agent seen for the first time.
    pub fn connected(system_uuid: &str, org: &str, at: DateTime<Utc>) -> Self {
        Self {
            system_uuid: system_uuid.to_string(),
            org: org.to_string(),
            status: ConnStatus::Connected,
            connected_at: Some(at),
            last_disconnected_at: None,
        }
    }

    /// Transition to connected. The org travels in the channel-open
    /// parameters and may change across re-installs.
    pub fn on_connect(&mut self, org: &str, at: DateTime<Utc>) {
        self.org = org.to_string();
        self.status = ConnStatus::Connected;
        self.connected_at = Some(at);
    }

    /// Transition to disconnected.
    pub fn on_disconnect(&mut self, at: DateTime<Utc>) {
        self.status = ConnStatus::Disconnected;
        self.last_disconnected_at = Some(at);
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnStatus::Connected
    }

    /// How long the agent has been gone, if it is gone.
    pub fn disconnected_for(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        match (self.status, self.last_disconnected_at) {
            (ConnStatus::Disconnected, Some(t)) => Some(now - t),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "liveness_tests.rs"]
mod tests;
