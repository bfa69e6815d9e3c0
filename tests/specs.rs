// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenario tests: the dispatch → inbox → handler →
//! response → result-store pipeline run in process, with the backup tool
//! stubbed by a shell script.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use warden_agent::{Channel, HandlerCtx, HandlerRegistry, Responder, Scheduler, ToolConfig};
use warden_controller::dispatch::{InitLocalRepoInput, LocalSnapshotsInput, SchedulerInput};
use warden_controller::results::{INITIALIZED_LOCAL_REPOS, LOCAL_SNAPSHOTS};
use warden_controller::{Broker, DocStore, LivenessStore, Mutations, ResultStore};
use warden_core::{FakeClock, Interval};
use warden_ledger::{Ledger, ScheduleStatus};
use warden_vault::Vault;
use warden_wire::{decode_downstream, decode_response, DownstreamFrame, ResponseMessage};

struct ControllerSide {
    broker: Arc<Broker>,
    liveness: LivenessStore,
    results: ResultStore,
    store: Arc<DocStore>,
    mutations: Mutations,
}

fn controller(dir: &std::path::Path) -> ControllerSide {
    let vault = Vault::with_salt("controller-pass", b"fedcba9876543210");
    let broker = Arc::new(Broker::open(&dir.join("broker"), vault).unwrap());
    let store = Arc::new(DocStore::open(&dir.join("docs")).unwrap());
    let liveness = LivenessStore::new(store.clone());
    let results = ResultStore::new(store.clone());
    let s3 = Arc::new(warden_controller::s3ops::S3Ops::new(
        "/nonexistent/restic".into(),
        Duration::from_secs(1),
        results.clone(),
    ));
    let mutations = Mutations::new(Some(broker.clone()), liveness.clone(), s3);
    ControllerSide { broker, liveness, results, store, mutations }
}

struct AgentSide {
    ctx: Arc<HandlerCtx>,
    registry: Arc<HandlerRegistry>,
    channel: Arc<Channel>,
    ledger: Ledger,
}

#[cfg(unix)]
fn agent(dir: &std::path::Path, tool_script: &str) -> AgentSide {
    use std::os::unix::fs::PermissionsExt;
    let bin = dir.join("restic-stub");
    std::fs::write(&bin, format!("#!/bin/sh\n{tool_script}\n")).unwrap();
    let mut perms = std::fs::metadata(&bin).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&bin, perms).unwrap();

    let ledger = Ledger::open(&dir.join("ledger")).unwrap();
    let vault = Vault::open(&dir.join("vault"), "agent-passphrase").unwrap();
    let channel = Arc::new(Channel::new());
    let responder = Responder::new(channel.clone(), ledger.clone());
    let ctx = Arc::new(HandlerCtx {
        ledger: ledger.clone(),
        vault,
        responder,
        tool: ToolConfig { bin, timeout: Duration::from_secs(10) },
    });
    AgentSide { ctx, registry: Arc::new(HandlerRegistry::build()), channel, ledger }
}

/// Pop the next inbox delivery and run it through the agent handler set,
/// acking afterwards like the channel client does.
async fn consume_one(controller: &ControllerSide, agent: &AgentSide, system_uuid: &str) {
    let pending = controller.broker.next_ready(system_uuid).unwrap();
    let mut frame = pending.body.clone();
    frame["delivery_tag"] = json!(pending.delivery_tag);
    match decode_downstream(&frame.to_string()).unwrap() {
        DownstreamFrame::Delivery(delivery) => {
            agent.registry.dispatch(agent.ctx.clone(), delivery.task, false).await;
        }
        other => panic!("unexpected frame {other:?}"),
    }
    controller.broker.ack(system_uuid, pending.delivery_tag).unwrap();
}

/// Forward every frame the agent queued upstream into the result store.
fn pump_responses(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>,
    controller: &ControllerSide,
    system_uuid: &str,
) -> Vec<ResponseMessage> {
    let mut forwarded = Vec::new();
    while let Ok(text) = rx.try_recv() {
        let msg = decode_response(&text).unwrap();
        controller.results.handle(Some(system_uuid), "acme", &msg, Utc::now());
        forwarded.push(msg);
    }
    forwarded
}

#[cfg(unix)]
#[tokio::test]
async fn init_local_repo_flows_to_the_result_store() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(dir.path());
    let agent = agent(
        dir.path(),
        r#"echo '{"message_type":"initialized","id":"abc","repository":"/var/b"}'"#,
    );

    controller.liveness.on_connect("A", "acme", Utc::now()).unwrap();
    controller.broker.declare("A").unwrap();

    let ack = controller.mutations.init_local_repo(InitLocalRepoInput {
        system_uuid: "A".into(),
        repo_path: "/var/b".into(),
        password: "p".into(),
        command_history: Some(true),
    });
    assert_eq!(ack, "Task allocated to initialize local repo: /var/b");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    agent.channel.attach(tx);
    consume_one(&controller, &agent, "A").await;
    let forwarded = pump_responses(&mut rx, &controller, "A");
    assert_eq!(forwarded.len(), 1);

    let doc = controller
        .store
        .find_one(INITIALIZED_LOCAL_REPOS, |d| {
            d["system_uuid"] == "A" && d["repo_path"] == "/var/b"
        })
        .unwrap();
    assert_eq!(doc["summary"]["id"], "abc");
}

#[cfg(unix)]
#[tokio::test]
async fn deliveries_arrive_in_dispatch_order() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(dir.path());

    controller.liveness.on_connect("A", "acme", Utc::now()).unwrap();
    controller.broker.declare("A").unwrap();
    controller.broker.declare("B").unwrap();

    for repo in ["/repo/one", "/repo/two", "/repo/three"] {
        controller.mutations.init_local_repo(InitLocalRepoInput {
            system_uuid: "A".into(),
            repo_path: repo.into(),
            password: "p".into(),
            command_history: None,
        });
    }

    // Nothing leaked into another agent's inbox.
    assert_eq!(controller.broker.pending_count("B"), 0);

    for expected in ["/repo/one", "/repo/two", "/repo/three"] {
        let msg = controller.broker.next_ready("A").unwrap();
        assert_eq!(msg.body["repo_path"], expected);
        controller.broker.ack("A", msg.delivery_tag).unwrap();
    }
}

#[cfg(unix)]
#[tokio::test]
async fn scheduled_snapshots_defer_then_flush_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(dir.path());
    let agent = agent(
        dir.path(),
        r#"echo '[{"id":"aaa","time":"2026-01-01T00:00:00Z","paths":["/etc"]}]'"#,
    );
    let clock = FakeClock::new();
    let scheduler = Scheduler::new(
        agent.ledger.clone(),
        agent.registry.clone(),
        agent.ctx.clone(),
        clock.clone(),
    );

    controller.liveness.on_connect("A", "acme", Utc::now()).unwrap();
    controller.broker.declare("A").unwrap();

    let ack = controller.mutations.get_local_repo_snapshots(LocalSnapshotsInput {
        system_uuid: "A".into(),
        repo_path: "/var/b".into(),
        password: "p".into(),
        command_history: None,
        scheduler: SchedulerInput {
            scheduler: Some("interval".into()),
            scheduler_repeats: Some("3".into()),
            scheduler_priority: None,
            interval: Some(Interval { minutes: 5, ..Interval::default() }),
            timelapse: None,
        },
    });
    assert_eq!(ack, "Task allocated to retrieve snapshots for local repo: /var/b");

    // Agent consumes the schedule task (channel closed, like a daemon
    // that lost its link right after accepting).
    let pending = controller.broker.next_ready("A").unwrap();
    let mut frame = pending.body.clone();
    frame["delivery_tag"] = json!(pending.delivery_tag);
    match decode_downstream(&frame.to_string()).unwrap() {
        DownstreamFrame::Delivery(delivery) => {
            scheduler.accept(delivery.task).unwrap();
        }
        other => panic!("unexpected frame {other:?}"),
    }
    controller.broker.ack("A", pending.delivery_tag).unwrap();

    // Three firings, five minutes apart; every response materializes in
    // the schedule ledger because the task was a scheduled variant.
    for _ in 0..3 {
        clock.advance(chrono::Duration::minutes(5));
        scheduler.tick().await;
    }
    assert_eq!(scheduler.active_jobs(), 0);
    let deferred: Vec<_> = agent
        .ledger
        .schedule_rows(ScheduleStatus::Pending)
        .into_iter()
        .filter(|row| row.payload["type"] == "response_local_repo_snapshots")
        .collect();
    assert_eq!(deferred.len(), 3);

    // Reconnect: the flush drains them upstream; identical listings
    // dedupe into one stored document.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    agent.channel.attach(tx);
    agent.ctx.responder.flush_deferred();
    let forwarded = pump_responses(&mut rx, &controller, "A");
    assert_eq!(forwarded.len(), 3);

    let docs = controller.store.find(LOCAL_SNAPSHOTS, |_| true);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["snapshots"][0]["id"], "aaa");
    assert!(agent
        .ledger
        .schedule_rows(ScheduleStatus::Pending)
        .iter()
        .all(|row| row.payload["type"] != "response_local_repo_snapshots"));
}

#[cfg(unix)]
#[tokio::test]
async fn credentials_never_reach_the_ledger_in_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(dir.path());
    let agent = agent(
        dir.path(),
        r#"echo '{"message_type":"initialized","id":"abc","repository":"/var/b"}'"#,
    );

    controller.liveness.on_connect("A", "acme", Utc::now()).unwrap();
    controller.broker.declare("A").unwrap();
    controller.mutations.init_local_repo(InitLocalRepoInput {
        system_uuid: "A".into(),
        repo_path: "/var/b".into(),
        password: "hunter2-super-secret".into(),
        command_history: Some(true),
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    agent.channel.attach(tx);
    consume_one(&controller, &agent, "A").await;
    while rx.try_recv().is_ok() {}

    // The history row exists, and no ledger file carries the plaintext.
    let kind = warden_core::OpKind::new(warden_core::Verb::Init, warden_core::RepoClass::Local);
    assert_eq!(agent.ledger.operation_count(kind), 1);
    for entry in std::fs::read_dir(dir.path().join("ledger")).unwrap() {
        let path = entry.unwrap().path();
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        assert!(
            !content.contains("hunter2-super-secret"),
            "plaintext credential in {}",
            path.display()
        );
    }
}

#[tokio::test]
async fn second_identical_listing_does_not_bump_the_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(dir.path());
    let t0 = Utc::now();

    let snapshots: Vec<warden_wire::Snapshot> =
        serde_json::from_value(json!([{"id": "aaa", "time": "2026-01-01T00:00:00Z"}])).unwrap();
    let msg = ResponseMessage::LocalRepoSnapshots {
        repo_path: "/var/b".into(),
        snapshots,
    };
    controller.results.handle(Some("A"), "acme", &msg, t0);
    controller.results.handle(Some("A"), "acme", &msg, t0 + chrono::Duration::minutes(2));

    let doc: Value = controller.store.find_one(LOCAL_SNAPSHOTS, |_| true).unwrap();
    assert_eq!(doc["response_timestamp"], t0.to_rfc3339());
}
