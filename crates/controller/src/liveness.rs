// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `client_status` collection.
//!
//! Written only by the connection manager; the query surface and the DR
//! monitor read through this handle.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use warden_core::{ConnStatus, LivenessRecord};

use crate::docstore::{DocStore, StoreError};

pub const CLIENT_STATUS: &str = "client_status";

#[derive(Clone)]
pub struct LivenessStore {
    store: Arc<DocStore>,
}

impl LivenessStore {
    pub fn new(store: Arc<DocStore>) -> Self {
        Self { store }
    }

    pub fn on_connect(
        &self,
        system_uuid: &str,
        org: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let record = match self.get(system_uuid) {
            Some(mut record) => {
                record.on_connect(org, at);
                record
            }
            None => LivenessRecord::connected(system_uuid, org, at),
        };
        self.put(&record)?;
        tracing::info!(%system_uuid, %org, "logged connection");
        Ok(())
    }

    pub fn on_disconnect(&self, system_uuid: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let Some(mut record) = self.get(system_uuid) else {
            tracing::warn!(%system_uuid, "disconnect for unknown agent");
            return Ok(());
        };
        record.on_disconnect(at);
        self.put(&record)?;
        tracing::info!(%system_uuid, "logged disconnection");
        Ok(())
    }

    pub fn get(&self, system_uuid: &str) -> Option<LivenessRecord> {
        self.store
            .find_one(CLIENT_STATUS, |d| d["system_uuid"] == system_uuid)
            .and_then(|doc| serde_json::from_value(doc).ok())
    }

    pub fn all(&self) -> Vec<LivenessRecord> {
        self.store
            .find(CLIENT_STATUS, |_| true)
            .into_iter()
            .filter_map(|doc| serde_json::from_value(doc).ok())
            .collect()
    }

    pub fn is_connected(&self, system_uuid: &str) -> bool {
        self.get(system_uuid).map(|r| r.status == ConnStatus::Connected).unwrap_or(false)
    }

    fn put(&self, record: &LivenessRecord) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record)?;
        let uuid = record.system_uuid.clone();
        self.store
            .upsert(CLIENT_STATUS, move |d: &Value| d["system_uuid"] == uuid.as_str(), doc)
    }
}

#[cfg(test)]
#[path = "liveness_tests.rs"]
mod tests;
