// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The mutation surface.
//!
//! Each mutation gates on the target agent's liveness, builds a task
//! message, validates and applies any scheduling enrichment, and
//! publishes the message durably to the agent's inbox. Every return
//! value is a caller-visible acknowledgement or error string; validation
//! failures enqueue nothing.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use warden_core::{Interval, OpKind, Repeats, RepoClass, SchedulePlan, ScheduleMode, Verb};
use warden_wire::{TaskMessage, TaskType};

use crate::broker::{Broker, BrokerError};
use crate::liveness::LivenessStore;
use crate::s3ops::{S3Ops, S3Params};

pub const ERR_NOT_CONNECTED: &str = "Error: Client not connected";
pub const ERR_NO_QUEUE: &str = "Error: Queue not found for the client";

/// Scheduling fields shared by the schedulable mutations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerInput {
    #[serde(default)]
    pub scheduler: Option<String>,
    #[serde(default)]
    pub scheduler_repeats: Option<String>,
    #[serde(default)]
    pub scheduler_priority: Option<String>,
    #[serde(default)]
    pub interval: Option<Interval>,
    #[serde(default)]
    pub timelapse: Option<String>,
}

impl SchedulerInput {
    fn is_requested(&self) -> bool {
        self.scheduler.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitLocalRepoInput {
    pub system_uuid: String,
    pub repo_path: String,
    pub password: String,
    #[serde(default)]
    pub command_history: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalSnapshotsInput {
    pub system_uuid: String,
    pub repo_path: String,
    pub password: String,
    #[serde(default)]
    pub command_history: Option<bool>,
    #[serde(flatten)]
    pub scheduler: SchedulerInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalBackupInput {
    pub system_uuid: String,
    pub repo_path: String,
    pub password: String,
    pub paths: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_options: Vec<String>,
    #[serde(default)]
    pub command_history: Option<bool>,
    #[serde(flatten)]
    pub scheduler: SchedulerInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalRestoreInput {
    pub system_uuid: String,
    pub repo_path: String,
    pub password: String,
    pub snapshot_id: String,
    pub target_path: String,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub custom_options: Vec<String>,
    #[serde(default)]
    pub command_history: Option<bool>,
    #[serde(flatten)]
    pub scheduler: SchedulerInput,
}

/// Controller-side cloud operations (`init_s3_repo`, `get_s3_repo_snapshots`).
#[derive(Debug, Clone, Deserialize)]
pub struct S3RepoInput {
    pub org: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub region: String,
    pub bucket_name: String,
    pub password: String,
    #[serde(default)]
    pub aws_session_token: Option<String>,
}

impl S3RepoInput {
    fn params(&self) -> S3Params {
        S3Params {
            aws_access_key_id: self.aws_access_key_id.clone(),
            aws_secret_access_key: self.aws_secret_access_key.clone(),
            aws_session_token: self.aws_session_token.clone(),
            region: self.region.clone(),
            bucket_name: self.bucket_name.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3BackupInput {
    pub system_uuid: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub region: String,
    pub bucket_name: String,
    pub password: String,
    pub paths: Vec<String>,
    #[serde(default)]
    pub aws_session_token: Option<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_options: Vec<String>,
    #[serde(default)]
    pub command_history: Option<bool>,
    #[serde(flatten)]
    pub scheduler: SchedulerInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3RestoreInput {
    pub system_uuid: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub region: String,
    pub bucket_name: String,
    pub password: String,
    pub snapshot_id: String,
    pub target_path: String,
    #[serde(default)]
    pub aws_session_token: Option<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub custom_options: Vec<String>,
    #[serde(default)]
    pub command_history: Option<bool>,
    #[serde(flatten)]
    pub scheduler: SchedulerInput,
}

pub struct Mutations {
    broker: Option<Arc<Broker>>,
    liveness: LivenessStore,
    s3: Arc<S3Ops>,
}

impl Mutations {
    pub fn new(broker: Option<Arc<Broker>>, liveness: LivenessStore, s3: Arc<S3Ops>) -> Self {
        Self { broker, liveness, s3 }
    }

    pub fn init_local_repo(&self, input: InitLocalRepoInput) -> String {
        let broker = match self.gate(&input.system_uuid) {
            Ok(broker) => broker,
            Err(e) => return e,
        };
        let mut params = Map::new();
        params.insert("repo_path".into(), Value::String(input.repo_path.clone()));
        params.insert("password".into(), Value::String(input.password));
        insert_history(&mut params, input.command_history);
        let task = TaskMessage::new(
            TaskType::immediate(OpKind::new(Verb::Init, RepoClass::Local)),
            params,
        );
        match self.publish(&broker, &input.system_uuid, &task) {
            Ok(()) => format!("Task allocated to initialize local repo: {}", input.repo_path),
            Err(e) => e,
        }
    }

    pub fn get_local_repo_snapshots(&self, input: LocalSnapshotsInput) -> String {
        let broker = match self.gate(&input.system_uuid) {
            Ok(broker) => broker,
            Err(e) => return e,
        };
        let mut params = Map::new();
        params.insert("repo_path".into(), Value::String(input.repo_path.clone()));
        params.insert("password".into(), Value::String(input.password));
        insert_history(&mut params, input.command_history);
        let task_type = match apply_scheduler(
            OpKind::new(Verb::ListSnapshots, RepoClass::Local),
            &mut params,
            &input.scheduler,
        ) {
            Ok(task_type) => task_type,
            Err(e) => return e,
        };
        match self.publish(&broker, &input.system_uuid, &TaskMessage::new(task_type, params)) {
            Ok(()) => {
                format!("Task allocated to retrieve snapshots for local repo: {}", input.repo_path)
            }
            Err(e) => e,
        }
    }

    pub fn do_local_repo_backup(&self, input: LocalBackupInput) -> String {
        let broker = match self.gate(&input.system_uuid) {
            Ok(broker) => broker,
            Err(e) => return e,
        };
        let mut params = Map::new();
        params.insert("repo_path".into(), Value::String(input.repo_path.clone()));
        params.insert("password".into(), Value::String(input.password));
        params.insert("paths".into(), strings(&input.paths));
        params.insert("exclude".into(), strings(&input.exclude));
        params.insert("tags".into(), strings(&input.tags));
        params.insert("custom_options".into(), strings(&input.custom_options));
        insert_history(&mut params, input.command_history);
        let task_type = match apply_scheduler(
            OpKind::new(Verb::Backup, RepoClass::Local),
            &mut params,
            &input.scheduler,
        ) {
            Ok(task_type) => task_type,
            Err(e) => return e,
        };
        match self.publish(&broker, &input.system_uuid, &TaskMessage::new(task_type, params)) {
            Ok(()) => format!("Task allocated to backup to local repo: {}", input.repo_path),
            Err(e) => e,
        }
    }

    pub fn do_local_repo_restore(&self, input: LocalRestoreInput) -> String {
        let broker = match self.gate(&input.system_uuid) {
            Ok(broker) => broker,
            Err(e) => return e,
        };
        let mut params = Map::new();
        params.insert("repo_path".into(), Value::String(input.repo_path.clone()));
        params.insert("password".into(), Value::String(input.password));
        params.insert("snapshot_id".into(), Value::String(input.snapshot_id));
        params.insert("target_path".into(), Value::String(input.target_path));
        params.insert("exclude".into(), strings(&input.exclude));
        params.insert("include".into(), strings(&input.include));
        params.insert("custom_options".into(), strings(&input.custom_options));
        insert_history(&mut params, input.command_history);
        let task_type = match apply_scheduler(
            OpKind::new(Verb::Restore, RepoClass::Local),
            &mut params,
            &input.scheduler,
        ) {
            Ok(task_type) => task_type,
            Err(e) => return e,
        };
        match self.publish(&broker, &input.system_uuid, &TaskMessage::new(task_type, params)) {
            Ok(()) => format!("Task allocated to restore from local repo: {}", input.repo_path),
            Err(e) => e,
        }
    }

    pub async fn init_s3_repo(&self, input: S3RepoInput) -> String {
        self.s3.init(&input.org, &input.params()).await
    }

    pub async fn get_s3_repo_snapshots(&self, input: S3RepoInput) -> String {
        self.s3.snapshots(&input.org, &input.params()).await
    }

    pub fn do_s3_repo_backup(&self, input: S3BackupInput) -> String {
        let broker = match self.gate(&input.system_uuid) {
            Ok(broker) => broker,
            Err(e) => return e,
        };
        let mut params = Map::new();
        insert_s3_credentials(
            &mut params,
            &input.aws_access_key_id,
            &input.aws_secret_access_key,
            &input.aws_session_token,
            &input.region,
            &input.bucket_name,
            &input.password,
        );
        params.insert("paths".into(), strings(&input.paths));
        params.insert("exclude".into(), strings(&input.exclude));
        params.insert("tags".into(), strings(&input.tags));
        params.insert("custom_options".into(), strings(&input.custom_options));
        insert_history(&mut params, input.command_history);
        let task_type = match apply_scheduler(
            OpKind::new(Verb::Backup, RepoClass::S3),
            &mut params,
            &input.scheduler,
        ) {
            Ok(task_type) => task_type,
            Err(e) => return e,
        };
        match self.publish(&broker, &input.system_uuid, &TaskMessage::new(task_type, params)) {
            Ok(()) => format!("Task allocated to backup to s3 repo: {}", input.bucket_name),
            Err(e) => e,
        }
    }

    pub fn do_s3_repo_restore(&self, input: S3RestoreInput) -> String {
        let broker = match self.gate(&input.system_uuid) {
            Ok(broker) => broker,
            Err(e) => return e,
        };
        let mut params = Map::new();
        insert_s3_credentials(
            &mut params,
            &input.aws_access_key_id,
            &input.aws_secret_access_key,
            &input.aws_session_token,
            &input.region,
            &input.bucket_name,
            &input.password,
        );
        params.insert("snapshot_id".into(), Value::String(input.snapshot_id));
        params.insert("target_path".into(), Value::String(input.target_path));
        params.insert("exclude".into(), strings(&input.exclude));
        params.insert("include".into(), strings(&input.include));
        params.insert("custom_options".into(), strings(&input.custom_options));
        insert_history(&mut params, input.command_history);
        let task_type = match apply_scheduler(
            OpKind::new(Verb::Restore, RepoClass::S3),
            &mut params,
            &input.scheduler,
        ) {
            Ok(task_type) => task_type,
            Err(e) => return e,
        };
        match self.publish(&broker, &input.system_uuid, &TaskMessage::new(task_type, params)) {
            Ok(()) => format!("Task allocated to restore from s3 repo: {}", input.bucket_name),
            Err(e) => e,
        }
    }

    fn gate(&self, system_uuid: &str) -> Result<Arc<Broker>, String> {
        if !self.liveness.is_connected(system_uuid) {
            return Err(ERR_NOT_CONNECTED.to_string());
        }
        match &self.broker {
            Some(broker) => Ok(broker.clone()),
            None => Err(ERR_NO_QUEUE.to_string()),
        }
    }

    fn publish(&self, broker: &Broker, system_uuid: &str, task: &TaskMessage) -> Result<(), String> {
        let body = match serde_json::to_value(task) {
            Ok(body) => body,
            Err(e) => return Err(format!("Error: {e}")),
        };
        match broker.publish(system_uuid, body) {
            Ok(tag) => {
                tracing::info!(%system_uuid, tag, task = %task.task_type, "task published");
                Ok(())
            }
            Err(BrokerError::NoInbox(_)) => Err(ERR_NO_QUEUE.to_string()),
            Err(e) => Err(format!("Error: {e}")),
        }
    }
}

/// Validate scheduling inputs and enrich the params; returns the final
/// task type.
fn apply_scheduler(
    kind: OpKind,
    params: &mut Map<String, Value>,
    input: &SchedulerInput,
) -> Result<TaskType, String> {
    if !input.is_requested() {
        return Ok(TaskType::immediate(kind));
    }
    let scheduler = input.scheduler.as_deref().unwrap_or_default();
    let plan = SchedulePlan::build(
        scheduler,
        input.scheduler_repeats.as_deref(),
        input.scheduler_priority.as_deref(),
        input.interval,
        input.timelapse.as_deref(),
    )
    .map_err(|e| e.to_string())?;

    match plan.mode {
        ScheduleMode::Interval => {
            if let Ok(interval) = serde_json::to_value(plan.interval) {
                params.insert("interval".into(), interval);
            }
        }
        ScheduleMode::Timelapse => {
            if let Some(at) = plan.timelapse {
                params.insert("timelapse".into(), Value::String(at.to_rfc3339()));
            }
        }
    }
    params.insert("scheduler_repeats".into(), Value::String(repeats_str(plan.repeats)));
    params.insert("scheduler_priority".into(), Value::from(plan.priority));
    Ok(TaskType::scheduled(kind, plan.mode))
}

fn repeats_str(repeats: Repeats) -> String {
    match repeats {
        Repeats::Once => "once".to_string(),
        Repeats::Infinite => "infinite".to_string(),
        Repeats::Count(n) => n.to_string(),
    }
}

fn strings(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

fn insert_history(params: &mut Map<String, Value>, command_history: Option<bool>) {
    if let Some(flag) = command_history {
        params.insert("command_history".into(), Value::Bool(flag));
    }
}

#[allow(clippy::too_many_arguments)]
fn insert_s3_credentials(
    params: &mut Map<String, Value>,
    access_key: &str,
    secret_key: &str,
    session_token: &Option<String>,
    region: &str,
    bucket_name: &str,
    password: &str,
) {
    params.insert("aws_access_key_id".into(), Value::String(access_key.to_string()));
    params.insert("aws_secret_access_key".into(), Value::String(secret_key.to_string()));
    if let Some(token) = session_token {
        params.insert("aws_session_token".into(), Value::String(token.clone()));
    }
    params.insert("region".into(), Value::String(region.to_string()));
    params.insert("bucket_name".into(), Value::String(bucket_name.to_string()));
    params.insert("password".into(), Value::String(password.to_string()));
}

/// The production restore workflow: rebuild a restore mutation from the
/// DR policy's `restore_config` and dispatch it like any other caller.
pub struct DispatchRestoreWorkflow {
    mutations: Arc<Mutations>,
}

impl DispatchRestoreWorkflow {
    pub fn new(mutations: Arc<Mutations>) -> Self {
        Self { mutations }
    }
}

#[async_trait::async_trait]
impl crate::dr::RestoreWorkflow for DispatchRestoreWorkflow {
    async fn trigger(&self, org: &str, agent_uuid: &str, restore_config: &Value) {
        let mut config = restore_config.clone();
        let Some(obj) = config.as_object_mut() else {
            tracing::error!(%org, %agent_uuid, "restore_config is not an object");
            return;
        };
        obj.insert("system_uuid".into(), Value::String(agent_uuid.to_string()));

        let ack = if obj.contains_key("repo_path") {
            match serde_json::from_value::<LocalRestoreInput>(config) {
                Ok(input) => self.mutations.do_local_repo_restore(input),
                Err(e) => format!("Error: invalid restore_config: {e}"),
            }
        } else if obj.contains_key("bucket_name") {
            match serde_json::from_value::<S3RestoreInput>(config) {
                Ok(input) => self.mutations.do_s3_repo_restore(input),
                Err(e) => format!("Error: invalid restore_config: {e}"),
            }
        } else {
            "Error: restore_config names no repository".to_string()
        };
        tracing::warn!(%org, %agent_uuid, %ack, "DR restore dispatched");
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
