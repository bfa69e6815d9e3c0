// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::channel::Channel;
use crate::executor::ToolConfig;
use crate::responder::Responder;
use serde_json::Map;
use std::time::Duration;
use warden_ledger::Ledger;
use warden_vault::Vault;
use warden_wire::TaskType;

fn ctx(dir: &std::path::Path) -> Arc<HandlerCtx> {
    let ledger = Ledger::open(dir).unwrap();
    let channel = Arc::new(Channel::new());
    Arc::new(HandlerCtx {
        ledger: ledger.clone(),
        vault: Vault::with_salt("pass", b"0123456789abcdef"),
        responder: Responder::new(channel, ledger),
        tool: ToolConfig { bin: "/nonexistent/restic".into(), timeout: Duration::from_secs(1) },
    })
}

#[test]
fn registry_covers_the_downstream_type_set() {
    let registry = HandlerRegistry::build();
    for task_type in [
        "init_local_repo",
        "get_local_repo_snapshots",
        "do_local_repo_backup",
        "do_local_repo_restore",
        "do_s3_repo_backup",
        "do_s3_repo_restore",
    ] {
        assert!(registry.handles(task_type), "{task_type} missing");
    }
    // Controller-side kinds are not agent handlers.
    assert!(!registry.handles("init_s3_repo"));
    assert!(!registry.handles("get_s3_repo_snapshots"));
}

#[tokio::test]
async fn dispatch_of_unregistered_kind_returns_false() {
    let dir = tempfile::tempdir().unwrap();
    let registry = HandlerRegistry::build();
    let task = TaskMessage::new(TaskType::parse("get_s3_repo_snapshots").unwrap(), Map::new());
    assert!(!registry.dispatch(ctx(dir.path()), task, false).await);
}

#[tokio::test]
async fn dispatch_runs_the_matching_handler() {
    let dir = tempfile::tempdir().unwrap();
    let registry = HandlerRegistry::build();
    // Missing params: handler logs and returns without spawning anything.
    let task = TaskMessage::new(TaskType::parse("init_local_repo").unwrap(), Map::new());
    assert!(registry.dispatch(ctx(dir.path()), task, false).await);
}
