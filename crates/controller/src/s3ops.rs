// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller-side cloud repository operations.
//!
//! `init_s3_repo` and `get_s3_repo_snapshots` are not agent-targeted:
//! the controller runs the backup tool itself with the cloud environment
//! and persists the outcome, then answers with the helper's result
//! string. stderr carrying the already-initialized marker is the
//! semantic "already initialized" outcome, not a failure.

use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use warden_wire::{ResponseMessage, Snapshot};

use crate::results::ResultStore;

const ALREADY_INIT_CLOUD: &str = "repository master key and config already initialized";

#[derive(Debug, Clone)]
pub struct S3Params {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_session_token: Option<String>,
    pub region: String,
    pub bucket_name: String,
    pub password: String,
}

impl S3Params {
    pub fn repo_url(&self) -> String {
        format!("objstore:{}/{}", self.region, self.bucket_name)
    }

    fn is_complete(&self) -> bool {
        !(self.aws_access_key_id.is_empty()
            || self.aws_secret_access_key.is_empty()
            || self.region.is_empty()
            || self.bucket_name.is_empty()
            || self.password.is_empty())
    }

    fn env(&self) -> Vec<(String, String)> {
        vec![
            ("AWS_ACCESS_KEY_ID".into(), self.aws_access_key_id.clone()),
            ("AWS_SECRET_ACCESS_KEY".into(), self.aws_secret_access_key.clone()),
            ("AWS_SESSION_TOKEN".into(), self.aws_session_token.clone().unwrap_or_default()),
            ("RESTIC_REPOSITORY".into(), self.repo_url()),
            ("RESTIC_PASSWORD".into(), self.password.clone()),
        ]
    }
}

pub struct S3Ops {
    bin: PathBuf,
    timeout: Duration,
    results: ResultStore,
}

enum RunOutcome {
    Success(String),
    AlreadyInitialized,
    Failed(String),
}

impl S3Ops {
    pub fn new(bin: PathBuf, timeout: Duration, results: ResultStore) -> Self {
        Self { bin, timeout, results }
    }

    /// Initialize (or recognize) a cloud repository.
    pub async fn init(&self, org: &str, params: &S3Params) -> String {
        if !params.is_complete() {
            return "Error: Missing essential initialization data!".to_string();
        }
        let repo = params.repo_url();
        match self.run_tool("init", params).await {
            RunOutcome::Success(stdout) => {
                let summary = first_object(&stdout).unwrap_or_else(|| {
                    serde_json::json!({"message_type": "initialized", "repository": repo})
                });
                self.results.handle(
                    None,
                    org,
                    &ResponseMessage::InitS3Repo { s3_url: repo.clone(), summary },
                    Utc::now(),
                );
                format!("Successfully executed init operation at {repo}")
            }
            RunOutcome::AlreadyInitialized => {
                tracing::info!(%repo, "cloud repository already initialized");
                self.results.handle(
                    None,
                    org,
                    &ResponseMessage::InitS3Repo {
                        s3_url: repo.clone(),
                        summary: serde_json::json!({
                            "message_type": "already_initialized",
                            "repository": repo,
                        }),
                    },
                    Utc::now(),
                );
                format!("Repository at {repo} already initialized.")
            }
            RunOutcome::Failed(e) => {
                tracing::error!(%repo, %e, "cloud init failed");
                format!("Error: {e}")
            }
        }
    }

    /// List snapshots of a cloud repository.
    pub async fn snapshots(&self, org: &str, params: &S3Params) -> String {
        if !params.is_complete() {
            return "Error: Missing essential initialization data!".to_string();
        }
        let repo = params.repo_url();
        match self.run_tool("snapshots", params).await {
            RunOutcome::Success(stdout) => match first_array(&stdout) {
                Some(snapshots) => {
                    let snapshots: Vec<Snapshot> =
                        serde_json::from_value(snapshots).unwrap_or_default();
                    self.results.handle(
                        None,
                        org,
                        &ResponseMessage::S3RepoSnapshots { s3_url: repo.clone(), snapshots },
                        Utc::now(),
                    );
                    format!("Successfully executed snapshots operation at {repo}")
                }
                None => {
                    tracing::error!(%repo, "no snapshot list in tool output");
                    "Error: No JSON found in the command output.".to_string()
                }
            },
            RunOutcome::AlreadyInitialized | RunOutcome::Failed(_) => {
                format!("Error: Command failed for snapshots operation at {repo}")
            }
        }
    }

    async fn run_tool(&self, verb: &str, params: &S3Params) -> RunOutcome {
        let mut cmd = Command::new(&self.bin);
        cmd.arg(verb)
            .arg("--json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in params.env() {
            cmd.env(key, value);
        }
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return RunOutcome::Failed(format!("failed to spawn backup tool: {e}")),
        };
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return RunOutcome::Failed(format!("backup tool failed: {e}")),
            Err(_) => return RunOutcome::Failed("Timeout while executing the command".into()),
        };
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            if verb == "init" && stderr.contains(ALREADY_INIT_CLOUD) {
                return RunOutcome::AlreadyInitialized;
            }
            return RunOutcome::Failed(format!("Command failed: {stderr}"));
        }
        RunOutcome::Success(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn first_object(stdout: &str) -> Option<Value> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .find(Value::is_object)
}

fn first_array(stdout: &str) -> Option<Value> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .find(Value::is_array)
}

#[cfg(test)]
#[path = "s3ops_tests.rs"]
mod tests;
