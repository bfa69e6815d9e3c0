// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use tempfile::tempdir;
use warden_wire::{ResponseMessage, Snapshot, TaskStatus};

fn results(dir: &std::path::Path) -> (ResultStore, Arc<DocStore>) {
    let store = Arc::new(DocStore::open(dir).unwrap());
    (ResultStore::new(store.clone()), store)
}

fn snapshots(ids: &[&str]) -> Vec<Snapshot> {
    ids.iter()
        .map(|id| {
            serde_json::from_value(json!({"id": id, "time": "2026-01-01T00:00:00Z"})).unwrap()
        })
        .collect()
}

#[test]
fn init_response_is_stored_keyed_by_agent_and_repo() {
    let dir = tempdir().unwrap();
    let (results, store) = results(dir.path());

    let msg = ResponseMessage::InitLocalRepo {
        repo_path: "/var/b".into(),
        summary: json!({"message_type": "initialized", "repository": "/var/b", "id": "abc"}),
    };
    results.handle(Some("A"), "acme", &msg, Utc::now());

    let doc = store
        .find_one(INITIALIZED_LOCAL_REPOS, |d| d["system_uuid"] == "A" && d["repo_path"] == "/var/b")
        .unwrap();
    assert_eq!(doc["summary"]["id"], "abc");
    assert_eq!(doc["org"], "acme");
}

#[test]
fn repeated_init_does_not_touch_the_stored_document() {
    let dir = tempdir().unwrap();
    let (results, store) = results(dir.path());
    let t0 = Utc::now();

    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::InitLocalRepo {
            repo_path: "/var/b".into(),
            summary: json!({"message_type": "initialized", "repository": "/var/b", "id": "abc"}),
        },
        t0,
    );
    let before = store.find_one(INITIALIZED_LOCAL_REPOS, |_| true).unwrap();

    // The agent re-ran init and reported already-initialized.
    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::InitLocalRepo {
            repo_path: "/var/b".into(),
            summary: json!({"message_type": "already_initialized", "repository": "/var/b"}),
        },
        t0 + chrono::Duration::minutes(10),
    );
    let after = store.find_one(INITIALIZED_LOCAL_REPOS, |_| true).unwrap();
    assert_eq!(before, after);
}

#[test]
fn equal_snapshot_lists_keep_the_old_timestamp() {
    let dir = tempdir().unwrap();
    let (results, store) = results(dir.path());
    let t0 = Utc::now();

    let snaps = snapshots(&["aaa", "bbb"]);
    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoSnapshots { repo_path: "/var/b".into(), snapshots: snaps.clone() },
        t0,
    );
    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoSnapshots { repo_path: "/var/b".into(), snapshots: snaps },
        t0 + chrono::Duration::minutes(5),
    );

    let doc = store.find_one(LOCAL_SNAPSHOTS, |_| true).unwrap();
    assert_eq!(doc["response_timestamp"], t0.to_rfc3339());
}

#[test]
fn changed_snapshot_lists_update_the_document() {
    let dir = tempdir().unwrap();
    let (results, store) = results(dir.path());
    let t0 = Utc::now();

    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoSnapshots { repo_path: "/var/b".into(), snapshots: snapshots(&["aaa"]) },
        t0,
    );
    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoSnapshots { repo_path: "/var/b".into(), snapshots: snapshots(&["aaa", "bbb"]) },
        t0 + chrono::Duration::minutes(5),
    );

    let docs = store.find(LOCAL_SNAPSHOTS, |_| true);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["snapshots"].as_array().unwrap().len(), 2);
}

#[test]
fn backup_job_converges_processing_to_completed() {
    let dir = tempdir().unwrap();
    let (results, store) = results(dir.path());
    let t0 = Utc::now();

    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoBackup {
            task_uuid: "t-1".into(),
            task_status: TaskStatus::Processing,
            repo_path: "/var/b".into(),
            backup_output: None,
            error: None,
        },
        t0,
    );
    let doc = store.find_one(LOCAL_BACKUPS, |_| true).unwrap();
    assert_eq!(doc["task_status"], "processing");

    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoBackup {
            task_uuid: "t-1".into(),
            task_status: TaskStatus::Completed,
            repo_path: "/var/b".into(),
            backup_output: Some(json!({"message_type": "summary", "files_new": 3})),
            error: None,
        },
        t0,
    );
    let docs = store.find(LOCAL_BACKUPS, |_| true);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["task_status"], "completed");
    assert_eq!(docs[0]["task_uuid"], "t-1");
    assert_eq!(docs[0]["backup_output"]["files_new"], 3);
}

#[test]
fn cloud_documents_are_keyed_by_target_alone() {
    let dir = tempdir().unwrap();
    let (results, store) = results(dir.path());

    results.handle(
        None,
        "acme",
        &ResponseMessage::InitS3Repo {
            s3_url: "objstore:us-east-1/bkt".into(),
            summary: json!({"message_type": "initialized", "id": "xyz"}),
        },
        Utc::now(),
    );
    let doc = store
        .find_one(INITIALIZED_CLOUD_REPOS, |d| d["s3_url"] == "objstore:us-east-1/bkt")
        .unwrap();
    assert!(doc.get("system_uuid").is_none());
}

#[test]
fn prune_sweeps_only_stale_cached_kinds() {
    let dir = tempdir().unwrap();
    let (results, store) = results(dir.path());
    let t0 = Utc::now();

    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoSnapshots { repo_path: "/var/b".into(), snapshots: snapshots(&["aaa"]) },
        t0 - chrono::Duration::minutes(10),
    );
    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::InitLocalRepo {
            repo_path: "/var/b".into(),
            summary: json!({"message_type": "initialized", "id": "abc"}),
        },
        t0 - chrono::Duration::minutes(10),
    );
    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoRestore {
            task_uuid: "t-2".into(),
            task_status: TaskStatus::Completed,
            repo_path: "/var/b".into(),
            restore_output: Some(json!({"files_restored": 1})),
            error: None,
        },
        t0 - chrono::Duration::minutes(10),
    );

    let removed = results.prune(t0, std::time::Duration::from_secs(60));
    assert_eq!(removed, 1);
    assert_eq!(store.count(LOCAL_SNAPSHOTS), 0);
    // Init and restore records are never pruned.
    assert_eq!(store.count(INITIALIZED_LOCAL_REPOS), 1);
    assert_eq!(store.count(LOCAL_RESTORES), 1);
}

#[test]
fn fresh_documents_survive_the_sweep() {
    let dir = tempdir().unwrap();
    let (results, store) = results(dir.path());
    let t0 = Utc::now();

    results.handle(
        Some("A"),
        "acme",
        &ResponseMessage::LocalRepoSnapshots { repo_path: "/var/b".into(), snapshots: snapshots(&["aaa"]) },
        t0,
    );
    assert_eq!(results.prune(t0 + chrono::Duration::seconds(30), std::time::Duration::from_secs(60)), 0);
    assert_eq!(store.count(LOCAL_SNAPSHOTS), 1);
}
