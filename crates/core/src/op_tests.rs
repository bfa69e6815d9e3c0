// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn all_kinds_are_distinct() {
    let mut tables: Vec<&str> = OpKind::ALL.iter().map(|k| k.table()).collect();
    tables.sort_unstable();
    tables.dedup();
    assert_eq!(tables.len(), 8);
}

#[parameterized(
    local_init = { "init_local_repo", Verb::Init, RepoClass::Local },
    local_snapshots = { "get_local_repo_snapshots", Verb::ListSnapshots, RepoClass::Local },
    local_backup = { "do_local_repo_backup", Verb::Backup, RepoClass::Local },
    local_restore = { "do_local_repo_restore", Verb::Restore, RepoClass::Local },
    s3_backup = { "do_s3_repo_backup", Verb::Backup, RepoClass::S3 },
    s3_restore = { "do_s3_repo_restore", Verb::Restore, RepoClass::S3 },
)]
fn task_type_round_trips(spelling: &str, verb: Verb, class: RepoClass) {
    let kind = OpKind::from_task_type(spelling).unwrap();
    assert_eq!(kind.verb, verb);
    assert_eq!(kind.class, class);
    assert_eq!(kind.task_type(), spelling);
}

#[test]
fn unknown_task_type_is_none() {
    assert!(OpKind::from_task_type("repo_snapshots").is_none());
    assert!(OpKind::from_task_type("local_repo_init").is_none());
}

#[test]
fn response_types_follow_spec_spelling() {
    let kind = OpKind::new(Verb::ListSnapshots, RepoClass::Local);
    assert_eq!(kind.response_type(), "response_local_repo_snapshots");
    let kind = OpKind::new(Verb::Init, RepoClass::S3);
    assert_eq!(kind.response_type(), "response_init_s3_repo");
}
