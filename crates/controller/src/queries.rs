// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The read-only query surface: client statuses and stored operation
//! results, filterable by agent, organization, and repository class.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::docstore::DocStore;
use crate::liveness::LivenessStore;
use crate::results::{
    CLOUD_BACKUPS, CLOUD_RESTORES, CLOUD_SNAPSHOTS, INITIALIZED_CLOUD_REPOS,
    INITIALIZED_LOCAL_REPOS, LOCAL_BACKUPS, LOCAL_RESTORES, LOCAL_SNAPSHOTS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub system_uuid: String,
    pub status: String,
    pub org: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializedRepo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(rename = "type")]
    pub repo_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Common filter for the repo/job queries. `type` selects `local`, `s3`,
/// or both when absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoFilter {
    #[serde(default)]
    pub system_uuid: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default, rename = "type")]
    pub repo_type: Option<String>,
}

impl RepoFilter {
    fn wants(&self, kind: &str) -> bool {
        self.repo_type.as_deref().map_or(true, |t| t == kind)
    }

    fn matches(&self, doc: &Value) -> bool {
        if let Some(uuid) = &self.system_uuid {
            if doc["system_uuid"] != uuid.as_str() {
                return false;
            }
        }
        if let Some(org) = &self.org {
            if doc["org"] != org.as_str() {
                return false;
            }
        }
        true
    }
}

#[derive(Clone)]
pub struct Queries {
    store: Arc<DocStore>,
    liveness: LivenessStore,
}

impl Queries {
    pub fn new(store: Arc<DocStore>, liveness: LivenessStore) -> Self {
        Self { store, liveness }
    }

    pub fn get_client_status(&self, system_uuid: &str) -> ClientStatus {
        match self.liveness.get(system_uuid) {
            Some(record) => ClientStatus {
                status: status_str(&record),
                system_uuid: record.system_uuid,
                org: record.org,
            },
            None => ClientStatus {
                system_uuid: system_uuid.to_string(),
                status: "not found".to_string(),
                org: String::new(),
            },
        }
    }

    pub fn get_all_clients(&self) -> Vec<ClientStatus> {
        self.liveness
            .all()
            .into_iter()
            .map(|record| ClientStatus {
                system_uuid: record.system_uuid.clone(),
                status: status_str(&record),
                org: record.org,
            })
            .collect()
    }

    pub fn get_org_clients(&self, org: &str) -> Vec<ClientStatus> {
        self.get_all_clients().into_iter().filter(|c| c.org == org).collect()
    }

    pub fn get_initialized_repos(&self, filter: &RepoFilter) -> Vec<InitializedRepo> {
        let mut repos = Vec::new();
        for (collection, kind) in
            [(INITIALIZED_LOCAL_REPOS, "local"), (INITIALIZED_CLOUD_REPOS, "s3")]
        {
            if !filter.wants(kind) {
                continue;
            }
            for doc in self.store.find(collection, |d| filter.matches(d)) {
                repos.push(InitializedRepo {
                    system_uuid: str_field(&doc, "system_uuid"),
                    org: str_field(&doc, "org"),
                    repo_type: kind.to_string(),
                    repo: doc["summary"]["repository"].as_str().map(str::to_string),
                    id: doc["summary"]["id"].as_str().map(str::to_string),
                });
            }
        }
        repos
    }

    pub fn get_repo_snapshots(&self, filter: &RepoFilter) -> Vec<Value> {
        self.collect_jobs(filter, LOCAL_SNAPSHOTS, CLOUD_SNAPSHOTS)
    }

    pub fn get_backup_jobs(&self, filter: &RepoFilter) -> Vec<Value> {
        self.collect_jobs(filter, LOCAL_BACKUPS, CLOUD_BACKUPS)
    }

    pub fn get_restore_jobs(&self, filter: &RepoFilter) -> Vec<Value> {
        self.collect_jobs(filter, LOCAL_RESTORES, CLOUD_RESTORES)
    }

    fn collect_jobs(&self, filter: &RepoFilter, local: &str, cloud: &str) -> Vec<Value> {
        let mut docs = Vec::new();
        for (collection, kind) in [(local, "local"), (cloud, "s3")] {
            if !filter.wants(kind) {
                continue;
            }
            for mut doc in self.store.find(collection, |d| filter.matches(d)) {
                if let Some(obj) = doc.as_object_mut() {
                    obj.insert("type".into(), Value::String(kind.to_string()));
                }
                docs.push(doc);
            }
        }
        docs
    }
}

fn status_str(record: &warden_core::LivenessRecord) -> String {
    match record.status {
        warden_core::ConnStatus::Connected => "connected".to_string(),
        warden_core::ConnStatus::Disconnected => "disconnected".to_string(),
    }
}

fn str_field(doc: &Value, key: &str) -> Option<String> {
    doc[key].as_str().map(str::to_string)
}

#[cfg(test)]
#[path = "queries_tests.rs"]
mod tests;
