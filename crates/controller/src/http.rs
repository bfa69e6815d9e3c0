// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller's HTTP surface: the `/token` auth endpoint, the agent
//! channel endpoint, and a thin JSON transport over the mutation and
//! query surfaces. The RPC schema layer proper (GraphQL in some deploys)
//! sits in front of these routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::conn::{self, ConnCtx};
use crate::dispatch::{
    InitLocalRepoInput, LocalBackupInput, LocalRestoreInput, LocalSnapshotsInput, S3BackupInput,
    S3RepoInput, S3RestoreInput,
};
use crate::queries::RepoFilter;

pub fn router(ctx: Arc<ConnCtx>) -> Router {
    Router::new()
        .route("/token", post(token))
        .route("/ws/{system_uuid}", get(conn::ws_handler))
        .route("/api/init_local_repo", post(init_local_repo))
        .route("/api/get_local_repo_snapshots", post(get_local_repo_snapshots))
        .route("/api/do_local_repo_backup", post(do_local_repo_backup))
        .route("/api/do_local_repo_restore", post(do_local_repo_restore))
        .route("/api/init_s3_repo", post(init_s3_repo))
        .route("/api/get_s3_repo_snapshots", post(get_s3_repo_snapshots))
        .route("/api/do_s3_repo_backup", post(do_s3_repo_backup))
        .route("/api/do_s3_repo_restore", post(do_s3_repo_restore))
        .route("/api/clients", get(all_clients))
        .route("/api/clients/{system_uuid}", get(client_status))
        .route("/api/orgs/{org}/clients", get(org_clients))
        .route("/api/initialized_repos", get(initialized_repos))
        .route("/api/repo_snapshots", get(repo_snapshots))
        .route("/api/backup_jobs", get(backup_jobs))
        .route("/api/restore_jobs", get(restore_jobs))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    system_uuid: String,
    password: String,
}

async fn token(State(ctx): State<Arc<ConnCtx>>, Json(req): Json<TokenRequest>) -> Response {
    if !ctx.auth.check_credentials(&req.password) {
        tracing::warn!(system_uuid = %req.system_uuid, "token request with bad credentials");
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "Invalid credentials"})))
            .into_response();
    }
    match ctx.auth.issue(&req.system_uuid) {
        Ok(access_token) => {
            Json(json!({"access_token": access_token, "token_type": "bearer"})).into_response()
        }
        Err(e) => {
            tracing::error!(%e, "token signing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "token signing failed"})))
                .into_response()
        }
    }
}

fn ack(result: String) -> Json<serde_json::Value> {
    Json(json!({"result": result}))
}

async fn init_local_repo(
    State(ctx): State<Arc<ConnCtx>>,
    Json(input): Json<InitLocalRepoInput>,
) -> Json<serde_json::Value> {
    ack(ctx.mutations.init_local_repo(input))
}

async fn get_local_repo_snapshots(
    State(ctx): State<Arc<ConnCtx>>,
    Json(input): Json<LocalSnapshotsInput>,
) -> Json<serde_json::Value> {
    ack(ctx.mutations.get_local_repo_snapshots(input))
}

async fn do_local_repo_backup(
    State(ctx): State<Arc<ConnCtx>>,
    Json(input): Json<LocalBackupInput>,
) -> Json<serde_json::Value> {
    ack(ctx.mutations.do_local_repo_backup(input))
}

async fn do_local_repo_restore(
    State(ctx): State<Arc<ConnCtx>>,
    Json(input): Json<LocalRestoreInput>,
) -> Json<serde_json::Value> {
    ack(ctx.mutations.do_local_repo_restore(input))
}

async fn init_s3_repo(
    State(ctx): State<Arc<ConnCtx>>,
    Json(input): Json<S3RepoInput>,
) -> Json<serde_json::Value> {
    ack(ctx.mutations.init_s3_repo(input).await)
}

async fn get_s3_repo_snapshots(
    State(ctx): State<Arc<ConnCtx>>,
    Json(input): Json<S3RepoInput>,
) -> Json<serde_json::Value> {
    ack(ctx.mutations.get_s3_repo_snapshots(input).await)
}

async fn do_s3_repo_backup(
    State(ctx): State<Arc<ConnCtx>>,
    Json(input): Json<S3BackupInput>,
) -> Json<serde_json::Value> {
    ack(ctx.mutations.do_s3_repo_backup(input))
}

async fn do_s3_repo_restore(
    State(ctx): State<Arc<ConnCtx>>,
    Json(input): Json<S3RestoreInput>,
) -> Json<serde_json::Value> {
    ack(ctx.mutations.do_s3_repo_restore(input))
}

async fn all_clients(State(ctx): State<Arc<ConnCtx>>) -> Json<serde_json::Value> {
    Json(json!(ctx.queries.get_all_clients()))
}

async fn client_status(
    State(ctx): State<Arc<ConnCtx>>,
    Path(system_uuid): Path<String>,
) -> Json<serde_json::Value> {
    Json(json!(ctx.queries.get_client_status(&system_uuid)))
}

async fn org_clients(
    State(ctx): State<Arc<ConnCtx>>,
    Path(org): Path<String>,
) -> Json<serde_json::Value> {
    Json(json!(ctx.queries.get_org_clients(&org)))
}

async fn initialized_repos(
    State(ctx): State<Arc<ConnCtx>>,
    Query(filter): Query<RepoFilter>,
) -> Json<serde_json::Value> {
    Json(json!(ctx.queries.get_initialized_repos(&filter)))
}

async fn repo_snapshots(
    State(ctx): State<Arc<ConnCtx>>,
    Query(filter): Query<RepoFilter>,
) -> Json<serde_json::Value> {
    Json(json!(ctx.queries.get_repo_snapshots(&filter)))
}

async fn backup_jobs(
    State(ctx): State<Arc<ConnCtx>>,
    Query(filter): Query<RepoFilter>,
) -> Json<serde_json::Value> {
    Json(json!(ctx.queries.get_backup_jobs(&filter)))
}

async fn restore_jobs(
    State(ctx): State<Arc<ConnCtx>>,
    Query(filter): Query<RepoFilter>,
) -> Json<serde_json::Value> {
    Json(json!(ctx.queries.get_restore_jobs(&filter)))
}
