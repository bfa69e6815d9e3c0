// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream response messages from agent to controller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Snapshot, WireError};

/// Lifecycle of a long-running backup/restore task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseMessage {
    /// Completes the in-flight delivery with the given tag.
    #[serde(rename = "ack")]
    Ack { delivery_tag: u64 },

    #[serde(rename = "response_init_local_repo")]
    InitLocalRepo { repo_path: String, summary: Value },

    #[serde(rename = "response_local_repo_snapshots")]
    LocalRepoSnapshots { repo_path: String, snapshots: Vec<Snapshot> },

    #[serde(rename = "response_local_repo_backup")]
    LocalRepoBackup {
        task_uuid: String,
        task_status: TaskStatus,
        repo_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backup_output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "response_local_repo_restore")]
    LocalRepoRestore {
        task_uuid: String,
        task_status: TaskStatus,
        repo_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        restore_output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "response_init_s3_repo")]
    InitS3Repo { s3_url: String, summary: Value },

    #[serde(rename = "response_s3_repo_snapshots")]
    S3RepoSnapshots { s3_url: String, snapshots: Vec<Snapshot> },

    #[serde(rename = "response_s3_repo_backup")]
    S3RepoBackup {
        task_uuid: String,
        task_status: TaskStatus,
        s3_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backup_output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "response_s3_repo_restore")]
    S3RepoRestore {
        task_uuid: String,
        task_status: TaskStatus,
        s3_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        restore_output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ResponseMessage {
    /// The wire `type` string of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResponseMessage::Ack { .. } => "ack",
            ResponseMessage::InitLocalRepo { .. } => "response_init_local_repo",
            ResponseMessage::LocalRepoSnapshots { .. } => "response_local_repo_snapshots",
            ResponseMessage::LocalRepoBackup { .. } => "response_local_repo_backup",
            ResponseMessage::LocalRepoRestore { .. } => "response_local_repo_restore",
            ResponseMessage::InitS3Repo { .. } => "response_init_s3_repo",
            ResponseMessage::S3RepoSnapshots { .. } => "response_s3_repo_snapshots",
            ResponseMessage::S3RepoBackup { .. } => "response_s3_repo_backup",
            ResponseMessage::S3RepoRestore { .. } => "response_s3_repo_restore",
        }
    }

    /// The task status riding on this message, for job-style responses.
    pub fn task_status(&self) -> Option<TaskStatus> {
        match self {
            ResponseMessage::LocalRepoBackup { task_status, .. }
            | ResponseMessage::LocalRepoRestore { task_status, .. }
            | ResponseMessage::S3RepoBackup { task_status, .. }
            | ResponseMessage::S3RepoRestore { task_status, .. } => Some(*task_status),
            _ => None,
        }
    }
}

/// Decode an upstream frame.
pub fn decode_response(text: &str) -> Result<ResponseMessage, WireError> {
    let value: Value = serde_json::from_str(text)?;
    let type_name = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(WireError::MissingField("type"))?
        .to_string();
    serde_json::from_value(value).map_err(|_| WireError::UnknownType(type_name))
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
