// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for local-repository operations.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use warden_core::{OpKind, RepoClass, Verb};
use warden_wire::{ResponseMessage, TaskMessage, TaskStatus};

use crate::executor::{self, ExecError, ALREADY_INIT_LOCAL};

use super::{record_history, required, HandlerCtx};

pub async fn init_local_repo(ctx: Arc<HandlerCtx>, task: TaskMessage, scheduled: bool) {
    let Some(repo_path) = required(&task, "repo_path").map(str::to_string) else { return };
    let Some(password) = required(&task, "password").map(str::to_string) else { return };
    tracing::info!(%repo_path, "initializing local repository");

    let inv = executor::local_init(&repo_path, &password);
    let summary = match executor::run(&ctx.tool, &inv).await {
        Ok(out) => match executor::find_object(&out.stdout) {
            Some(summary) => summary,
            None => {
                tracing::error!(%repo_path, "no JSON object in init output");
                return;
            }
        },
        Err(ExecError::Failed { stderr, .. }) if stderr.contains(ALREADY_INIT_LOCAL) => {
            tracing::info!(%repo_path, "repository already initialized");
            json!({"message_type": "already_initialized", "repository": repo_path})
        }
        Err(e) => {
            tracing::error!(%e, %repo_path, "init failed");
            return;
        }
    };

    let msg = ResponseMessage::InitLocalRepo { repo_path, summary: summary.clone() };
    ctx.responder.emit(scheduled, &msg);
    record_history(&ctx, OpKind::new(Verb::Init, RepoClass::Local), &task, &summary);
}

pub async fn get_local_repo_snapshots(ctx: Arc<HandlerCtx>, task: TaskMessage, scheduled: bool) {
    let Some(repo_path) = required(&task, "repo_path").map(str::to_string) else { return };
    let Some(password) = required(&task, "password").map(str::to_string) else { return };
    tracing::info!(%repo_path, "listing snapshots");

    let inv = executor::local_snapshots(&repo_path, &password);
    let snapshots = match executor::run(&ctx.tool, &inv).await {
        Ok(out) => match executor::parse_snapshots(&out.stdout) {
            Ok(snaps) => snaps,
            Err(e) => {
                tracing::error!(%e, %repo_path, "unparseable snapshot listing");
                return;
            }
        },
        Err(e) => {
            tracing::error!(%e, %repo_path, "snapshot listing failed");
            return;
        }
    };

    let history = serde_json::to_value(&snapshots).unwrap_or_default();
    let msg = ResponseMessage::LocalRepoSnapshots { repo_path, snapshots };
    ctx.responder.emit(scheduled, &msg);
    record_history(&ctx, OpKind::new(Verb::ListSnapshots, RepoClass::Local), &task, &history);
}

pub async fn do_local_repo_backup(ctx: Arc<HandlerCtx>, task: TaskMessage, scheduled: bool) {
    let Some(repo_path) = required(&task, "repo_path").map(str::to_string) else { return };
    let Some(password) = required(&task, "password").map(str::to_string) else { return };
    let paths = task.param_strings("paths");
    if paths.is_empty() {
        tracing::error!(%repo_path, "backup task has no paths");
        return;
    }
    let task_uuid = Uuid::new_v4().to_string();
    tracing::info!(%repo_path, %task_uuid, "starting backup");

    ctx.responder.emit(
        scheduled,
        &ResponseMessage::LocalRepoBackup {
            task_uuid: task_uuid.clone(),
            task_status: TaskStatus::Processing,
            repo_path: repo_path.clone(),
            backup_output: None,
            error: None,
        },
    );

    let inv = executor::local_backup(
        &repo_path,
        &password,
        &paths,
        &task.param_strings("exclude"),
        &task.param_strings("tags"),
        &task.param_strings("custom_options"),
    );
    let outcome = match executor::run(&ctx.tool, &inv).await {
        Ok(out) => executor::find_summary(&out.stdout).ok_or(ExecError::NoSummary),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(summary) => {
            ctx.responder.emit(
                scheduled,
                &ResponseMessage::LocalRepoBackup {
                    task_uuid,
                    task_status: TaskStatus::Completed,
                    repo_path,
                    backup_output: Some(summary.clone()),
                    error: None,
                },
            );
            record_history(&ctx, OpKind::new(Verb::Backup, RepoClass::Local), &task, &summary);
        }
        Err(e) => {
            tracing::error!(%e, "backup failed");
            ctx.responder.emit(
                scheduled,
                &ResponseMessage::LocalRepoBackup {
                    task_uuid,
                    task_status: TaskStatus::Failed,
                    repo_path,
                    backup_output: None,
                    error: Some(e.to_string()),
                },
            );
        }
    }
}

pub async fn do_local_repo_restore(ctx: Arc<HandlerCtx>, task: TaskMessage, scheduled: bool) {
    let Some(repo_path) = required(&task, "repo_path").map(str::to_string) else { return };
    let Some(password) = required(&task, "password").map(str::to_string) else { return };
    let Some(snapshot_id) = required(&task, "snapshot_id").map(str::to_string) else { return };
    let Some(target_path) = required(&task, "target_path").map(str::to_string) else { return };
    let task_uuid = Uuid::new_v4().to_string();
    tracing::info!(%repo_path, %snapshot_id, %task_uuid, "starting restore");

    ctx.responder.emit(
        scheduled,
        &ResponseMessage::LocalRepoRestore {
            task_uuid: task_uuid.clone(),
            task_status: TaskStatus::Processing,
            repo_path: repo_path.clone(),
            restore_output: None,
            error: None,
        },
    );

    let inv = executor::local_restore(
        &repo_path,
        &password,
        &snapshot_id,
        &target_path,
        &task.param_strings("exclude"),
        &task.param_strings("include"),
        &task.param_strings("custom_options"),
    );
    let outcome = match executor::run(&ctx.tool, &inv).await {
        Ok(out) => executor::find_summary(&out.stdout).ok_or(ExecError::NoSummary),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(summary) => {
            ctx.responder.emit(
                scheduled,
                &ResponseMessage::LocalRepoRestore {
                    task_uuid,
                    task_status: TaskStatus::Completed,
                    repo_path,
                    restore_output: Some(summary.clone()),
                    error: None,
                },
            );
            record_history(&ctx, OpKind::new(Verb::Restore, RepoClass::Local), &task, &summary);
        }
        Err(e) => {
            tracing::error!(%e, "restore failed");
            ctx.responder.emit(
                scheduled,
                &ResponseMessage::LocalRepoRestore {
                    task_uuid,
                    task_status: TaskStatus::Failed,
                    repo_path,
                    restore_output: None,
                    error: Some(e.to_string()),
                },
            );
        }
    }
}
