// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::docstore::DocStore;
use crate::results::{CLOUD_SNAPSHOTS, INITIALIZED_CLOUD_REPOS};
use std::sync::Arc;
use tempfile::tempdir;

fn params() -> S3Params {
    S3Params {
        aws_access_key_id: "AKIA".into(),
        aws_secret_access_key: "secret".into(),
        aws_session_token: None,
        region: "us-east-1".into(),
        bucket_name: "bkt".into(),
        password: "p".into(),
    }
}

fn ops_with_stub(dir: &std::path::Path, script: &str) -> (S3Ops, Arc<DocStore>) {
    let store = Arc::new(DocStore::open(&dir.join("store")).unwrap());
    let results = ResultStore::new(store.clone());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let bin = dir.join("restic-stub");
        std::fs::write(&bin, format!("#!/bin/sh\n{script}\n")).unwrap();
        let mut perms = std::fs::metadata(&bin).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&bin, perms).unwrap();
        (S3Ops::new(bin, Duration::from_secs(5), results), store)
    }
}

#[test]
fn repo_url_uses_objstore_scheme() {
    assert_eq!(params().repo_url(), "objstore:us-east-1/bkt");
}

#[tokio::test]
async fn missing_fields_short_circuit() {
    let dir = tempdir().unwrap();
    let (ops, _) = ops_with_stub(dir.path(), "exit 0");
    let mut p = params();
    p.bucket_name = String::new();
    assert_eq!(ops.init("acme", &p).await, "Error: Missing essential initialization data!");
}

#[cfg(unix)]
#[tokio::test]
async fn successful_init_persists_and_acks() {
    let dir = tempdir().unwrap();
    let (ops, store) = ops_with_stub(
        dir.path(),
        r#"echo '{"message_type":"initialized","id":"xyz","repository":"objstore:us-east-1/bkt"}'"#,
    );
    let ack = ops.init("acme", &params()).await;
    assert_eq!(ack, "Successfully executed init operation at objstore:us-east-1/bkt");
    let doc = store.find_one(INITIALIZED_CLOUD_REPOS, |_| true).unwrap();
    assert_eq!(doc["summary"]["id"], "xyz");
}

#[cfg(unix)]
#[tokio::test]
async fn already_initialized_is_recognized() {
    let dir = tempdir().unwrap();
    let (ops, _) = ops_with_stub(
        dir.path(),
        "echo 'Fatal: create key in repository: repository master key and config already initialized' >&2; exit 1",
    );
    let ack = ops.init("acme", &params()).await;
    assert_eq!(ack, "Repository at objstore:us-east-1/bkt already initialized.");
}

#[cfg(unix)]
#[tokio::test]
async fn snapshots_persist_listing() {
    let dir = tempdir().unwrap();
    let (ops, store) = ops_with_stub(
        dir.path(),
        r#"echo '[{"id":"aaa","time":"2026-01-01T00:00:00Z"}]'"#,
    );
    let ack = ops.snapshots("acme", &params()).await;
    assert_eq!(ack, "Successfully executed snapshots operation at objstore:us-east-1/bkt");
    let doc = store.find_one(CLOUD_SNAPSHOTS, |_| true).unwrap();
    assert_eq!(doc["snapshots"][0]["id"], "aaa");
}

#[cfg(unix)]
#[tokio::test]
async fn failed_init_returns_error_string() {
    let dir = tempdir().unwrap();
    let (ops, store) = ops_with_stub(dir.path(), "echo 'no credentials' >&2; exit 1");
    let ack = ops.init("acme", &params()).await;
    assert!(ack.starts_with("Error: Command failed:"), "{ack}");
    assert!(store.find_one(INITIALIZED_CLOUD_REPOS, |_| true).is_none());
}
