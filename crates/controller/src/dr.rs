// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The disaster-recovery monitor.
//!
//! Loads the per-org DR policy at startup, then checks every enabled
//! agent's liveness once a minute (after a one-minute warm-up that lets
//! agents reconnect). An agent disconnected past its threshold triggers
//! the restore workflow exactly once per disconnect episode; the trigger
//! latch re-arms when the agent reconnects. An invalid policy document
//! stops the monitor from starting and nothing else.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use warden_core::Clock;

use crate::liveness::LivenessStore;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy file {0} not found")]
    NotFound(String),

    #[error("policy file is not valid JSON5: {0}")]
    Parse(String),

    #[error("policy document is malformed: {0}")]
    Shape(String),

    #[error("invalid DR threshold `{0}`")]
    Threshold(String),
}

/// Per-agent policy entry.
#[derive(Debug, Clone)]
pub struct AgentDrPolicy {
    pub org: String,
    pub agent_uuid: String,
    pub enabled: bool,
    pub threshold: Duration,
    pub restore_config: Value,
}

#[derive(Debug, Clone, Default)]
pub struct DrPolicy {
    pub agents: Vec<AgentDrPolicy>,
}

impl DrPolicy {
    /// Load and validate the JSON-with-comments policy document.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| PolicyError::NotFound(path.display().to_string()))?;
        let doc: Value = json5::from_str(&text).map_err(|e| PolicyError::Parse(e.to_string()))?;
        Self::from_value(&doc)
    }

    pub fn from_value(doc: &Value) -> Result<Self, PolicyError> {
        let orgs = doc
            .get("ORGS")
            .and_then(Value::as_object)
            .ok_or_else(|| PolicyError::Shape("missing ORGS mapping".into()))?;

        let mut agents = Vec::new();
        for (org, org_data) in orgs {
            let Some(dr) = org_data.get("DR") else {
                tracing::warn!(%org, "no DR configuration for organization");
                continue;
            };
            let entries = dr
                .get("agents")
                .and_then(Value::as_object)
                .ok_or_else(|| PolicyError::Shape(format!("org {org} DR has no agents map")))?;
            for (agent_uuid, entry) in entries {
                let enabled = entry.get("enabled").and_then(Value::as_bool).unwrap_or(false);
                let threshold_raw = entry
                    .get("DR_monitoring_threshold")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        PolicyError::Shape(format!("agent {agent_uuid} has no threshold"))
                    })?;
                agents.push(AgentDrPolicy {
                    org: org.clone(),
                    agent_uuid: agent_uuid.clone(),
                    enabled,
                    threshold: parse_threshold(threshold_raw)?,
                    restore_config: entry.get("restore_config").cloned().unwrap_or(Value::Null),
                });
            }
        }
        Ok(Self { agents })
    }

    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentDrPolicy> {
        self.agents.iter().filter(|a| a.enabled)
    }
}

/// Parse `PT<H>H<M>M<S>S` (any field optional) or the `<N>h<N>m[<N>s]`
/// fallback.
pub fn parse_threshold(raw: &str) -> Result<Duration, PolicyError> {
    let (body, units): (&str, [char; 3]) = match raw.strip_prefix("PT") {
        Some(rest) => (rest, ['H', 'M', 'S']),
        None => (raw, ['h', 'm', 's']),
    };
    let mut hours = 0i64;
    let mut minutes = 0i64;
    let mut seconds = 0i64;
    let mut num = String::new();
    let mut any = false;
    for c in body.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        if c.is_whitespace() && num.is_empty() {
            continue;
        }
        let value: i64 = num.parse().map_err(|_| PolicyError::Threshold(raw.to_string()))?;
        num.clear();
        any = true;
        match c {
            u if u == units[0] => hours = value,
            u if u == units[1] => minutes = value,
            u if u == units[2] => seconds = value,
            _ => return Err(PolicyError::Threshold(raw.to_string())),
        }
    }
    if !num.is_empty() || !any {
        return Err(PolicyError::Threshold(raw.to_string()));
    }
    Ok(Duration::hours(hours) + Duration::minutes(minutes) + Duration::seconds(seconds))
}

/// The restore side-effect seam. The production workflow dispatches a
/// restore mutation from the policy's `restore_config`; it is expected
/// to be idempotent at the workflow layer.
#[async_trait]
pub trait RestoreWorkflow: Send + Sync {
    async fn trigger(&self, org: &str, agent_uuid: &str, restore_config: &Value);
}

pub struct DrMonitor<C: Clock> {
    policy: DrPolicy,
    liveness: LivenessStore,
    workflow: Arc<dyn RestoreWorkflow>,
    clock: C,
    /// agent_uuid → the `last_disconnected_at` already triggered for.
    latches: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl<C: Clock> DrMonitor<C> {
    pub fn new(
        policy: DrPolicy,
        liveness: LivenessStore,
        workflow: Arc<dyn RestoreWorkflow>,
        clock: C,
    ) -> Self {
        Self { policy, liveness, workflow, clock, latches: Mutex::new(HashMap::new()) }
    }

    /// One observation pass over every enabled agent.
    pub async fn check(&self) {
        let now = self.clock.now_utc();
        for agent in self.policy.enabled_agents() {
            let Some(record) = self.liveness.get(&agent.agent_uuid) else {
                tracing::debug!(agent = %agent.agent_uuid, "no liveness record yet");
                continue;
            };
            if record.is_connected() {
                self.latches.lock().remove(&agent.agent_uuid);
                continue;
            }
            let Some(disconnected_at) = record.last_disconnected_at else {
                continue;
            };
            if now - disconnected_at <= agent.threshold {
                continue;
            }
            if self.latches.lock().get(&agent.agent_uuid) == Some(&disconnected_at) {
                // Already triggered for this disconnect episode.
                continue;
            }
            tracing::warn!(
                agent = %agent.agent_uuid,
                org = %agent.org,
                gone_for = %(now - disconnected_at),
                "agent disconnected past its DR threshold, triggering restore"
            );
            self.workflow.trigger(&agent.org, &agent.agent_uuid, &agent.restore_config).await;
            self.latches.lock().insert(agent.agent_uuid.clone(), disconnected_at);
        }
    }

    /// Run until shutdown: one-minute warm-up, then one check per minute.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(agents = self.policy.agents.len(), "DR monitor started");
        if interruptible_wait(std::time::Duration::from_secs(60), &shutdown).await {
            return;
        }
        loop {
            self.check().await;
            if interruptible_wait(std::time::Duration::from_secs(60), &shutdown).await {
                return;
            }
        }
    }
}

/// Sleep in one-second steps; returns true when shutdown arrived.
async fn interruptible_wait(duration: std::time::Duration, shutdown: &CancellationToken) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if shutdown.is_cancelled() {
            return true;
        }
        let step = remaining.min(std::time::Duration::from_secs(1));
        tokio::select! {
            _ = shutdown.cancelled() => return true,
            _ = tokio::time::sleep(step) => {}
        }
        remaining = remaining.saturating_sub(step);
    }
    shutdown.is_cancelled()
}

#[cfg(test)]
#[path = "dr_tests.rs"]
mod tests;
