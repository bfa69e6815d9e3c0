// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn backup_summary_parses_tool_output() {
    let line = json!({
        "message_type": "summary",
        "files_new": 12,
        "files_changed": 3,
        "files_unmodified": 1480,
        "dirs_new": 1,
        "dirs_changed": 2,
        "dirs_unmodified": 210,
        "data_added": 1048576,
        "total_files_processed": 1495,
        "total_bytes_processed": 52428800,
        "total_duration": 4.2,
        "snapshot_id": "9f1a2b3c"
    });
    let summary: BackupSummary = serde_json::from_value(line).unwrap();
    assert_eq!(summary.message_type, "summary");
    assert_eq!(summary.files_new, 12);
    assert_eq!(summary.snapshot_id.as_deref(), Some("9f1a2b3c"));
}

#[test]
fn unknown_fields_survive_a_round_trip() {
    let line = json!({
        "message_type": "summary",
        "files_new": 1,
        "tree_blobs": 17
    });
    let summary: BackupSummary = serde_json::from_value(line).unwrap();
    assert_eq!(summary.extra["tree_blobs"], 17);
    let back = serde_json::to_value(&summary).unwrap();
    assert_eq!(back["tree_blobs"], 17);
}

#[test]
fn restore_summary_defaults_missing_counters() {
    let line = json!({"message_type": "summary", "files_restored": 4});
    let summary: RestoreSummary = serde_json::from_value(line).unwrap();
    assert_eq!(summary.files_restored, 4);
    assert_eq!(summary.total_bytes, 0);
}

#[test]
fn snapshot_tolerates_minimal_records() {
    let snap: Snapshot = serde_json::from_value(json!({"id": "abc", "time": "t"})).unwrap();
    assert_eq!(snap.id, "abc");
    assert!(snap.paths.is_empty());
    assert!(snap.summary.is_none());
}
