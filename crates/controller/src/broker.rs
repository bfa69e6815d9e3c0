// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable per-agent inbox broker.
//!
//! One JSONL spool file per agent under the broker directory. `publish`
//! appends a durable record before the message becomes visible; acks
//! append tombstones. Replay on declare rebuilds the pending queue, so
//! unacked messages survive a controller restart and redeliver in order.
//! Consumption is prefetch-1: at most one message per inbox is in flight
//! until its tag is acked.
//!
//! Credential fields in a published body are encrypted through the
//! controller vault before the spool write and decrypted at delivery, so
//! no spool file ever carries a plaintext secret.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use warden_vault::{decrypt_params, encrypt_params, Vault, VaultError};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker spool io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("broker spool record is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no inbox declared for agent {0}")]
    NoInbox(String),

    #[error("credential encryption failed: {0}")]
    Vault(#[from] VaultError),
}

/// One spool line.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum SpoolRecord {
    Publish { tag: u64, body: Value },
    Ack { tag: u64 },
}

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub delivery_tag: u64,
    pub body: Value,
}

struct Inbox {
    pending: VecDeque<PendingMessage>,
    in_flight: Option<u64>,
    next_tag: u64,
    notify: Arc<Notify>,
}

/// Per-process broker service. Constructed once at startup; reachability
/// is probed at open so a dead spool directory surfaces before any
/// channel is accepted.
pub struct Broker {
    dir: PathBuf,
    vault: Vault,
    inboxes: Mutex<HashMap<String, Inbox>>,
}

impl Broker {
    pub fn open(dir: &Path, vault: Vault) -> Result<Self, BrokerError> {
        std::fs::create_dir_all(dir)?;
        // Writability probe: a broker that cannot append is down.
        let probe = dir.join(".probe");
        std::fs::write(&probe, b"ok")?;
        std::fs::remove_file(&probe)?;
        Ok(Self { dir: dir.to_path_buf(), vault, inboxes: Mutex::new(HashMap::new()) })
    }

    fn spool_path(&self, system_uuid: &str) -> PathBuf {
        self.dir.join(format!("inbox_{system_uuid}.jsonl"))
    }

    /// Declare (or re-attach to) an agent's inbox, replaying its spool.
    pub fn declare(&self, system_uuid: &str) -> Result<(), BrokerError> {
        let mut inboxes = self.inboxes.lock();
        if inboxes.contains_key(system_uuid) {
            return Ok(());
        }
        let mut pending = VecDeque::new();
        let mut next_tag = 1u64;
        let path = self.spool_path(system_uuid);
        if path.exists() {
            let reader = BufReader::new(std::fs::File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<SpoolRecord>(&line)? {
                    SpoolRecord::Publish { tag, body } => {
                        next_tag = next_tag.max(tag + 1);
                        pending.push_back(PendingMessage { delivery_tag: tag, body });
                    }
                    SpoolRecord::Ack { tag } => {
                        pending.retain(|m| m.delivery_tag != tag);
                    }
                }
            }
        }
        tracing::info!(%system_uuid, pending = pending.len(), "inbox declared");
        inboxes.insert(
            system_uuid.to_string(),
            Inbox { pending, in_flight: None, next_tag, notify: Arc::new(Notify::new()) },
        );
        Ok(())
    }

    pub fn has_inbox(&self, system_uuid: &str) -> bool {
        self.inboxes.lock().contains_key(system_uuid)
    }

    /// Durably publish a message to an agent's inbox. Returns its tag.
    pub fn publish(&self, system_uuid: &str, body: Value) -> Result<u64, BrokerError> {
        let mut body = body;
        encrypt_params(&self.vault, &mut body)?;
        let mut inboxes = self.inboxes.lock();
        let inbox = inboxes
            .get_mut(system_uuid)
            .ok_or_else(|| BrokerError::NoInbox(system_uuid.to_string()))?;
        let tag = inbox.next_tag;
        inbox.next_tag += 1;
        let record = SpoolRecord::Publish { tag, body: body.clone() };
        append_record(&self.spool_path(system_uuid), &record)?;
        inbox.pending.push_back(PendingMessage { delivery_tag: tag, body });
        inbox.notify.notify_one();
        Ok(tag)
    }

    /// Take the head message for delivery, if none is already in flight.
    /// Credential fields are decrypted on the way out.
    pub fn next_ready(&self, system_uuid: &str) -> Option<PendingMessage> {
        let mut head = {
            let mut inboxes = self.inboxes.lock();
            let inbox = inboxes.get_mut(system_uuid)?;
            if inbox.in_flight.is_some() {
                return None;
            }
            let head = inbox.pending.front().cloned()?;
            inbox.in_flight = Some(head.delivery_tag);
            head
        };
        if let Err(e) = decrypt_params(&self.vault, &mut head.body) {
            tracing::error!(%e, %system_uuid, tag = head.delivery_tag, "credential decryption failed");
        }
        Some(head)
    }

    /// Complete an in-flight delivery. Returns `false` for a stale tag.
    pub fn ack(&self, system_uuid: &str, tag: u64) -> Result<bool, BrokerError> {
        let mut inboxes = self.inboxes.lock();
        let inbox = inboxes
            .get_mut(system_uuid)
            .ok_or_else(|| BrokerError::NoInbox(system_uuid.to_string()))?;
        if inbox.in_flight != Some(tag) {
            tracing::warn!(%system_uuid, tag, "ack for a tag that is not in flight");
            return Ok(false);
        }
        append_record(&self.spool_path(system_uuid), &SpoolRecord::Ack { tag })?;
        inbox.in_flight = None;
        inbox.pending.retain(|m| m.delivery_tag != tag);
        inbox.notify.notify_one();
        Ok(true)
    }

    /// Clear the in-flight marker so the head redelivers (channel lost
    /// before the ack arrived).
    pub fn reset_in_flight(&self, system_uuid: &str) {
        if let Some(inbox) = self.inboxes.lock().get_mut(system_uuid) {
            inbox.in_flight = None;
        }
    }

    /// Force-delete an inbox and its spool.
    pub fn delete(&self, system_uuid: &str) -> Result<(), BrokerError> {
        self.inboxes.lock().remove(system_uuid);
        let path = self.spool_path(system_uuid);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        tracing::info!(%system_uuid, "inbox deleted");
        Ok(())
    }

    /// Wake-up handle for the delivery task.
    pub fn notify_handle(&self, system_uuid: &str) -> Option<Arc<Notify>> {
        self.inboxes.lock().get(system_uuid).map(|i| i.notify.clone())
    }

    pub fn pending_count(&self, system_uuid: &str) -> usize {
        self.inboxes.lock().get(system_uuid).map_or(0, |i| i.pending.len())
    }
}

fn append_record(path: &Path, record: &SpoolRecord) -> Result<(), BrokerError> {
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
