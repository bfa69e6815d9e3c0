// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup-tool subprocess execution.
//!
//! The tool emits line-delimited JSON on stdout. The executor feeds local
//! repository passwords on stdin, supplies cloud credentials through the
//! environment, bounds the run with a timeout, and scans the output for
//! the operation result: the first `message_type == "summary"` line for
//! backup/restore, a single object for init, a JSON array for snapshot
//! listings.

use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use warden_wire::Snapshot;

/// stderr marker for an `init` against an already-initialized local repo.
pub const ALREADY_INIT_LOCAL: &str = "config file already exists";
/// stderr marker for an `init` against an already-initialized cloud repo.
pub const ALREADY_INIT_CLOUD: &str = "repository master key and config already initialized";

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub bin: PathBuf,
    pub timeout: Duration,
}

/// A fully computed subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin_line: Option<String>,
}

/// Raw output of a finished (or failed) run.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn backup tool: {0}")]
    Spawn(std::io::Error),

    #[error("backup tool timed out after {0:?}")]
    Timeout(Duration),

    #[error("backup tool exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("no summary line in backup tool output")]
    NoSummary,

    #[error("no JSON snapshot list in backup tool output")]
    NoSnapshots,
}

/// Run an invocation to completion.
///
/// Non-zero exit is returned as [`ExecError::Failed`] with stderr attached
/// so callers can recognize the already-initialized markers.
pub async fn run(cfg: &ToolConfig, inv: &Invocation) -> Result<ToolOutput, ExecError> {
    let mut cmd = Command::new(&cfg.bin);
    cmd.args(&inv.args)
        .stdin(if inv.stdin_line.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &inv.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(ExecError::Spawn)?;
    if let (Some(line), Some(mut stdin)) = (&inv.stdin_line, child.stdin.take()) {
        let payload = format!("{line}\n");
        let _ = stdin.write_all(payload.as_bytes()).await;
        // Dropping stdin closes the pipe so the tool stops waiting.
    }

    let waited = tokio::time::timeout(cfg.timeout, child.wait_with_output())
        .await
        .map_err(|_| ExecError::Timeout(cfg.timeout))?;
    let output = waited.map_err(ExecError::Spawn)?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(ExecError::Failed { code: output.status.code().unwrap_or(-1), stderr });
    }
    Ok(ToolOutput { stdout, stderr })
}

/// First stdout line whose JSON value carries `message_type == "summary"`.
/// Non-JSON lines are skipped.
pub fn find_summary(stdout: &str) -> Option<Value> {
    for line in stdout.lines() {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if value.get("message_type").and_then(Value::as_str) == Some("summary") {
            return Some(value);
        }
    }
    None
}

/// First stdout line that parses as a JSON object — the init result.
pub fn find_object(stdout: &str) -> Option<Value> {
    for line in stdout.lines() {
        if let Ok(value) = serde_json::from_str::<Value>(line) {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    None
}

/// First stdout line that parses as a JSON array of snapshot records.
pub fn parse_snapshots(stdout: &str) -> Result<Vec<Snapshot>, ExecError> {
    for line in stdout.lines() {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if value.is_array() {
            return serde_json::from_value(value).map_err(|_| ExecError::NoSnapshots);
        }
    }
    Err(ExecError::NoSnapshots)
}

/// The `objstore:` repository address for a cloud repo.
pub fn cloud_repo_url(region: &str, bucket: &str) -> String {
    format!("objstore:{region}/{bucket}")
}

/// Environment for a cloud invocation.
pub fn cloud_env(
    access_key: &str,
    secret_key: &str,
    session_token: Option<&str>,
    region: &str,
    bucket: &str,
    password: &str,
) -> Vec<(String, String)> {
    vec![
        ("AWS_ACCESS_KEY_ID".into(), access_key.into()),
        ("AWS_SECRET_ACCESS_KEY".into(), secret_key.into()),
        ("AWS_SESSION_TOKEN".into(), session_token.unwrap_or_default().into()),
        ("RESTIC_REPOSITORY".into(), cloud_repo_url(region, bucket)),
        ("RESTIC_PASSWORD".into(), password.into()),
    ]
}

pub fn local_init(repo_path: &str, password: &str) -> Invocation {
    Invocation {
        args: str_args(&["-r", repo_path, "init", "--json"]),
        env: Vec::new(),
        stdin_line: Some(password.to_string()),
    }
}

pub fn local_snapshots(repo_path: &str, password: &str) -> Invocation {
    Invocation {
        args: str_args(&["-r", repo_path, "snapshots", "--json"]),
        env: Vec::new(),
        stdin_line: Some(password.to_string()),
    }
}

pub fn local_backup(
    repo_path: &str,
    password: &str,
    paths: &[String],
    exclude: &[String],
    tags: &[String],
    custom_options: &[String],
) -> Invocation {
    let mut args = str_args(&["-r", repo_path, "backup", "--json"]);
    args.extend(paths.iter().cloned());
    for ex in exclude {
        args.push("--exclude".into());
        args.push(ex.clone());
    }
    for tag in tags {
        args.push("--tag".into());
        args.push(tag.clone());
    }
    args.extend(custom_options.iter().cloned());
    Invocation { args, env: Vec::new(), stdin_line: Some(password.to_string()) }
}

#[allow(clippy::too_many_arguments)]
pub fn local_restore(
    repo_path: &str,
    password: &str,
    snapshot_id: &str,
    target_path: &str,
    exclude: &[String],
    include: &[String],
    custom_options: &[String],
) -> Invocation {
    let mut args = str_args(&["-r", repo_path, "restore", snapshot_id, "--target", target_path, "--json"]);
    for ex in exclude {
        args.push("--exclude".into());
        args.push(ex.clone());
    }
    for inc in include {
        args.push("--include".into());
        args.push(inc.clone());
    }
    args.extend(custom_options.iter().cloned());
    Invocation { args, env: Vec::new(), stdin_line: Some(password.to_string()) }
}

/// Cloud verbs take the repository from `RESTIC_REPOSITORY`.
pub fn cloud_verb(verb: &str, env: Vec<(String, String)>, extra_args: Vec<String>) -> Invocation {
    let mut args = vec![verb.to_string()];
    args.extend(extra_args);
    args.push("--json".into());
    Invocation { args, env, stdin_line: None }
}

fn str_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
