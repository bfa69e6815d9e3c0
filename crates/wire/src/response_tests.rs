// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn ack_round_trips() {
    let text = crate::encode(&ResponseMessage::Ack { delivery_tag: 3 }).unwrap();
    assert_eq!(decode_response(&text).unwrap(), ResponseMessage::Ack { delivery_tag: 3 });
}

#[test]
fn init_response_carries_summary() {
    let msg = ResponseMessage::InitLocalRepo {
        repo_path: "/var/b".into(),
        summary: json!({"message_type": "initialized", "id": "abc", "repository": "/var/b"}),
    };
    let text = crate::encode(&msg).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "response_init_local_repo");
    assert_eq!(decode_response(&text).unwrap(), msg);
}

#[test]
fn backup_response_statuses_serialize_snake_case() {
    let msg = ResponseMessage::LocalRepoBackup {
        task_uuid: "t-1".into(),
        task_status: TaskStatus::Processing,
        repo_path: "/var/b".into(),
        backup_output: None,
        error: None,
    };
    let text = crate::encode(&msg).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["task_status"], "processing");
    // Absent optionals are omitted entirely.
    assert!(value.get("backup_output").is_none());
    assert!(value.get("error").is_none());
}

#[test]
fn failed_response_carries_error_string() {
    let text = r#"{
        "type": "response_s3_repo_restore",
        "task_uuid": "t-9",
        "task_status": "failed",
        "s3_url": "objstore:us-east-1/bkt",
        "error": "exit status 1"
    }"#;
    match decode_response(text).unwrap() {
        ResponseMessage::S3RepoRestore { task_status, error, .. } => {
            assert_eq!(task_status, TaskStatus::Failed);
            assert_eq!(error.as_deref(), Some("exit status 1"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn snapshots_response_round_trips_typed_records() {
    let snapshots: Vec<Snapshot> = serde_json::from_value(json!([
        {
            "id": "deadbeef",
            "short_id": "dead",
            "time": "2026-01-05T10:00:00Z",
            "paths": ["/etc"],
            "hostname": "web-1",
            "program_version": "restic 0.17.0"
        }
    ]))
    .unwrap();
    let msg = ResponseMessage::LocalRepoSnapshots {
        repo_path: "/var/b".into(),
        snapshots: snapshots.clone(),
    };
    let text = crate::encode(&msg).unwrap();
    match decode_response(&text).unwrap() {
        ResponseMessage::LocalRepoSnapshots { snapshots: back, .. } => {
            assert_eq!(back, snapshots)
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_response_type_is_an_error() {
    let text = r#"{"type": "response_tape_rewind"}"#;
    assert!(matches!(decode_response(text), Err(WireError::UnknownType(t)) if t == "response_tape_rewind"));
}

#[test]
fn type_names_match_wire_spellings() {
    let msg = ResponseMessage::S3RepoSnapshots { s3_url: "objstore:r/b".into(), snapshots: vec![] };
    assert_eq!(msg.type_name(), "response_s3_repo_snapshots");
    assert!(msg.task_status().is_none());
}
