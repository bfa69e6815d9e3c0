// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller result store.
//!
//! Persists per-operation responses into kind-specific collections,
//! keyed `(system_uuid, target)` for local kinds and `(target)` for
//! cloud kinds. A response equal to the stored payload is skipped
//! entirely so the stored `response_timestamp` reflects the last actual
//! change. A background sweep prunes cached snapshot and backup
//! documents past the retention window; init and restore documents are
//! kept forever.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use warden_wire::ResponseMessage;

use crate::docstore::DocStore;

pub const INITIALIZED_LOCAL_REPOS: &str = "initialized_local_repos";
pub const INITIALIZED_CLOUD_REPOS: &str = "initialized_cloud_repos";
pub const LOCAL_SNAPSHOTS: &str = "local_snapshots";
pub const CLOUD_SNAPSHOTS: &str = "cloud_snapshots";
pub const LOCAL_BACKUPS: &str = "local_backups";
pub const CLOUD_BACKUPS: &str = "cloud_backups";
pub const LOCAL_RESTORES: &str = "local_restores";
pub const CLOUD_RESTORES: &str = "cloud_restores";

/// Collections the sweep is allowed to prune.
const SWEPT: [&str; 4] = [LOCAL_SNAPSHOTS, CLOUD_SNAPSHOTS, LOCAL_BACKUPS, CLOUD_BACKUPS];

const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ResultStore {
    store: Arc<DocStore>,
}

impl ResultStore {
    pub fn new(store: Arc<DocStore>) -> Self {
        Self { store }
    }

    /// Persist one upstream response. `system_uuid` is absent for
    /// controller-side cloud operations.
    pub fn handle(
        &self,
        system_uuid: Option<&str>,
        org: &str,
        msg: &ResponseMessage,
        now: DateTime<Utc>,
    ) {
        let result = match msg {
            ResponseMessage::Ack { .. } => return,
            ResponseMessage::InitLocalRepo { repo_path, summary } => self.store_init(
                INITIALIZED_LOCAL_REPOS,
                system_uuid,
                org,
                "repo_path",
                repo_path,
                summary,
                now,
            ),
            ResponseMessage::InitS3Repo { s3_url, summary } => {
                self.store_init(INITIALIZED_CLOUD_REPOS, None, org, "s3_url", s3_url, summary, now)
            }
            ResponseMessage::LocalRepoSnapshots { repo_path, snapshots } => self.store_list(
                LOCAL_SNAPSHOTS,
                system_uuid,
                org,
                "repo_path",
                repo_path,
                snapshots,
                now,
            ),
            ResponseMessage::S3RepoSnapshots { s3_url, snapshots } => {
                self.store_list(CLOUD_SNAPSHOTS, None, org, "s3_url", s3_url, snapshots, now)
            }
            ResponseMessage::LocalRepoBackup { task_uuid, task_status, repo_path, backup_output, error } => {
                self.store_job(
                    LOCAL_BACKUPS,
                    system_uuid,
                    org,
                    "repo_path",
                    repo_path,
                    "backup_output",
                    task_uuid,
                    *task_status,
                    backup_output,
                    error,
                    now,
                )
            }
            ResponseMessage::S3RepoBackup { task_uuid, task_status, s3_url, backup_output, error } => {
                self.store_job(
                    CLOUD_BACKUPS,
                    None,
                    org,
                    "s3_url",
                    s3_url,
                    "backup_output",
                    task_uuid,
                    *task_status,
                    backup_output,
                    error,
                    now,
                )
            }
            ResponseMessage::LocalRepoRestore { task_uuid, task_status, repo_path, restore_output, error } => {
                self.store_job(
                    LOCAL_RESTORES,
                    system_uuid,
                    org,
                    "repo_path",
                    repo_path,
                    "restore_output",
                    task_uuid,
                    *task_status,
                    restore_output,
                    error,
                    now,
                )
            }
            ResponseMessage::S3RepoRestore { task_uuid, task_status, s3_url, restore_output, error } => {
                self.store_job(
                    CLOUD_RESTORES,
                    None,
                    org,
                    "s3_url",
                    s3_url,
                    "restore_output",
                    task_uuid,
                    *task_status,
                    restore_output,
                    error,
                    now,
                )
            }
        };
        if let Err(e) = result {
            tracing::error!(%e, kind = msg.type_name(), "failed to store response");
        }
    }

    /// Initialization records. A repeated init against an initialized
    /// repo ("already_initialized" summary, or an identical summary)
    /// leaves the stored document untouched.
    #[allow(clippy::too_many_arguments)]
    fn store_init(
        &self,
        collection: &str,
        system_uuid: Option<&str>,
        org: &str,
        target_key: &str,
        target: &str,
        summary: &Value,
        now: DateTime<Utc>,
    ) -> Result<(), crate::docstore::StoreError> {
        let existing = self.find_by_key(collection, system_uuid, target_key, target);
        if let Some(existing) = &existing {
            let repeat = summary.get("message_type").and_then(Value::as_str)
                == Some("already_initialized");
            if repeat || existing.get("summary") == Some(summary) {
                tracing::info!(collection, target, "repo already recorded, skipping update");
                return Ok(());
            }
        }
        let mut doc = json!({
            target_key: target,
            "org": org,
            "summary": summary,
            "response_timestamp": now.to_rfc3339(),
        });
        if let (Some(uuid), Some(obj)) = (system_uuid, doc.as_object_mut()) {
            obj.insert("system_uuid".into(), Value::String(uuid.to_string()));
        }
        self.upsert_by_key(collection, system_uuid, target_key, target, doc)
    }

    /// Snapshot listings. Equal snapshot lists skip the update so the
    /// stored timestamp is not bumped.
    #[allow(clippy::too_many_arguments)]
    fn store_list(
        &self,
        collection: &str,
        system_uuid: Option<&str>,
        org: &str,
        target_key: &str,
        target: &str,
        snapshots: &[warden_wire::Snapshot],
        now: DateTime<Utc>,
    ) -> Result<(), crate::docstore::StoreError> {
        let snapshots = serde_json::to_value(snapshots)?;
        let existing = self.find_by_key(collection, system_uuid, target_key, target);
        if let Some(existing) = &existing {
            if existing.get("snapshots") == Some(&snapshots) {
                tracing::info!(collection, target, "no snapshot changes, skipping update");
                return Ok(());
            }
        }
        let mut doc = json!({
            target_key: target,
            "org": org,
            "snapshots": snapshots,
            "response_timestamp": now.to_rfc3339(),
        });
        if let (Some(uuid), Some(obj)) = (system_uuid, doc.as_object_mut()) {
            obj.insert("system_uuid".into(), Value::String(uuid.to_string()));
        }
        self.upsert_by_key(collection, system_uuid, target_key, target, doc)
    }

    /// Backup/restore job records, converging processing → completed or
    /// failed under one `task_uuid`.
    #[allow(clippy::too_many_arguments)]
    fn store_job(
        &self,
        collection: &str,
        system_uuid: Option<&str>,
        org: &str,
        target_key: &str,
        target: &str,
        output_key: &str,
        task_uuid: &str,
        task_status: warden_wire::TaskStatus,
        output: &Option<Value>,
        error: &Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), crate::docstore::StoreError> {
        let existing = self.find_by_key(collection, system_uuid, target_key, target);
        if let (Some(existing), Some(output)) = (&existing, output) {
            if existing.get(output_key) == Some(output) {
                tracing::info!(collection, target, "unchanged job output, skipping update");
                return Ok(());
            }
        }
        let mut doc = json!({
            target_key: target,
            "org": org,
            "task_uuid": task_uuid,
            "task_status": task_status,
            "response_timestamp": now.to_rfc3339(),
        });
        if let Some(obj) = doc.as_object_mut() {
            if let Some(uuid) = system_uuid {
                obj.insert("system_uuid".into(), Value::String(uuid.to_string()));
            }
            if let Some(output) = output {
                obj.insert(output_key.into(), output.clone());
            }
            if let Some(error) = error {
                obj.insert("error".into(), Value::String(error.clone()));
            }
        }
        self.upsert_by_key(collection, system_uuid, target_key, target, doc)
    }

    fn find_by_key(
        &self,
        collection: &str,
        system_uuid: Option<&str>,
        target_key: &str,
        target: &str,
    ) -> Option<Value> {
        self.store.find_one(collection, |d| {
            d[target_key] == target
                && system_uuid.map_or(true, |uuid| d["system_uuid"] == uuid)
        })
    }

    fn upsert_by_key(
        &self,
        collection: &str,
        system_uuid: Option<&str>,
        target_key: &str,
        target: &str,
        doc: Value,
    ) -> Result<(), crate::docstore::StoreError> {
        let target = target.to_string();
        let target_key = target_key.to_string();
        let system_uuid = system_uuid.map(str::to_string);
        self.store.upsert(
            collection,
            move |d| {
                d[target_key.as_str()] == target.as_str()
                    && system_uuid.as_deref().map_or(true, |uuid| d["system_uuid"] == uuid)
            },
            doc,
        )
    }

    /// Drop swept documents whose `response_timestamp` is older than the
    /// retention window. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::seconds(60));
        let mut removed = 0;
        for collection in SWEPT {
            let result = self.store.retain(collection, |doc| {
                doc.get("response_timestamp")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc) >= cutoff)
                    .unwrap_or(true)
            });
            match result {
                Ok(n) => removed += n,
                Err(e) => tracing::error!(%e, collection, "sweep failed"),
            }
        }
        if removed > 0 {
            tracing::info!(removed, "pruned stale cached documents");
        }
        removed
    }

    /// Background sweep: every 60 s until shutdown.
    pub async fn sweep_loop(&self, retention: Duration, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(SWEEP_PERIOD) => {
                    self.prune(Utc::now(), retention);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "results_tests.rs"]
mod tests;
