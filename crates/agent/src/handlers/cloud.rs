// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for cloud-object repository operations.
//!
//! Credentials travel in the task params and reach the tool through its
//! environment; the repository address is `objstore:<region>/<bucket>`.

use std::sync::Arc;
use uuid::Uuid;
use warden_core::{OpKind, RepoClass, Verb};
use warden_wire::{ResponseMessage, TaskMessage, TaskStatus};

use crate::executor::{self, ExecError};

use super::{record_history, required, HandlerCtx};

struct CloudParams {
    env: Vec<(String, String)>,
    s3_url: String,
}

fn cloud_params(task: &TaskMessage) -> Option<CloudParams> {
    let access_key = required(task, "aws_access_key_id")?;
    let secret_key = required(task, "aws_secret_access_key")?;
    let region = required(task, "region")?;
    let bucket = required(task, "bucket_name")?;
    let password = required(task, "password")?;
    let session_token = task.param_str("aws_session_token");
    Some(CloudParams {
        env: executor::cloud_env(access_key, secret_key, session_token, region, bucket, password),
        s3_url: executor::cloud_repo_url(region, bucket),
    })
}

pub async fn do_s3_repo_backup(ctx: Arc<HandlerCtx>, task: TaskMessage, scheduled: bool) {
    let Some(cloud) = cloud_params(&task) else { return };
    let paths = task.param_strings("paths");
    if paths.is_empty() {
        tracing::error!(s3_url = %cloud.s3_url, "backup task has no paths");
        return;
    }
    let task_uuid = Uuid::new_v4().to_string();
    tracing::info!(s3_url = %cloud.s3_url, %task_uuid, "starting cloud backup");

    ctx.responder.emit(
        scheduled,
        &ResponseMessage::S3RepoBackup {
            task_uuid: task_uuid.clone(),
            task_status: TaskStatus::Processing,
            s3_url: cloud.s3_url.clone(),
            backup_output: None,
            error: None,
        },
    );

    let mut args = paths.clone();
    for ex in task.param_strings("exclude") {
        args.push("--exclude".into());
        args.push(ex);
    }
    for tag in task.param_strings("tags") {
        args.push("--tag".into());
        args.push(tag);
    }
    args.extend(task.param_strings("custom_options"));
    let inv = executor::cloud_verb("backup", cloud.env, args);

    let outcome = match executor::run(&ctx.tool, &inv).await {
        Ok(out) => executor::find_summary(&out.stdout).ok_or(ExecError::NoSummary),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(summary) => {
            ctx.responder.emit(
                scheduled,
                &ResponseMessage::S3RepoBackup {
                    task_uuid,
                    task_status: TaskStatus::Completed,
                    s3_url: cloud.s3_url,
                    backup_output: Some(summary.clone()),
                    error: None,
                },
            );
            record_history(&ctx, OpKind::new(Verb::Backup, RepoClass::S3), &task, &summary);
        }
        Err(e) => {
            tracing::error!(%e, "cloud backup failed");
            ctx.responder.emit(
                scheduled,
                &ResponseMessage::S3RepoBackup {
                    task_uuid,
                    task_status: TaskStatus::Failed,
                    s3_url: cloud.s3_url,
                    backup_output: None,
                    error: Some(e.to_string()),
                },
            );
        }
    }
}

pub async fn do_s3_repo_restore(ctx: Arc<HandlerCtx>, task: TaskMessage, scheduled: bool) {
    let Some(cloud) = cloud_params(&task) else { return };
    let Some(snapshot_id) = required(&task, "snapshot_id").map(str::to_string) else { return };
    let Some(target_path) = required(&task, "target_path").map(str::to_string) else { return };
    let task_uuid = Uuid::new_v4().to_string();
    tracing::info!(s3_url = %cloud.s3_url, %snapshot_id, %task_uuid, "starting cloud restore");

    ctx.responder.emit(
        scheduled,
        &ResponseMessage::S3RepoRestore {
            task_uuid: task_uuid.clone(),
            task_status: TaskStatus::Processing,
            s3_url: cloud.s3_url.clone(),
            restore_output: None,
            error: None,
        },
    );

    let mut args = vec![snapshot_id, "--target".into(), target_path];
    for ex in task.param_strings("exclude") {
        args.push("--exclude".into());
        args.push(ex);
    }
    for inc in task.param_strings("include") {
        args.push("--include".into());
        args.push(inc);
    }
    args.extend(task.param_strings("custom_options"));
    let inv = executor::cloud_verb("restore", cloud.env, args);

    let outcome = match executor::run(&ctx.tool, &inv).await {
        Ok(out) => executor::find_summary(&out.stdout).ok_or(ExecError::NoSummary),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(summary) => {
            ctx.responder.emit(
                scheduled,
                &ResponseMessage::S3RepoRestore {
                    task_uuid,
                    task_status: TaskStatus::Completed,
                    s3_url: cloud.s3_url,
                    restore_output: Some(summary.clone()),
                    error: None,
                },
            );
            record_history(&ctx, OpKind::new(Verb::Restore, RepoClass::S3), &task, &summary);
        }
        Err(e) => {
            tracing::error!(%e, "cloud restore failed");
            ctx.responder.emit(
                scheduled,
                &ResponseMessage::S3RepoRestore {
                    task_uuid,
                    task_status: TaskStatus::Failed,
                    s3_url: cloud.s3_url,
                    restore_output: None,
                    error: Some(e.to_string()),
                },
            );
        }
    }
}
