// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use tempfile::tempdir;

fn open(dir: &Path) -> Broker {
    Broker::open(dir, Vault::with_salt("broker-pass", b"0123456789abcdef")).unwrap()
}

#[test]
fn publish_requires_a_declared_inbox() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    assert!(matches!(
        broker.publish("agent-a", json!({"type": "init_local_repo"})),
        Err(BrokerError::NoInbox(_))
    ));
}

#[test]
fn fifo_order_is_preserved() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();

    for i in 0..3 {
        broker.publish("agent-a", json!({"seq": i})).unwrap();
    }

    for i in 0..3 {
        let msg = broker.next_ready("agent-a").unwrap();
        assert_eq!(msg.body["seq"], i);
        broker.ack("agent-a", msg.delivery_tag).unwrap();
    }
    assert!(broker.next_ready("agent-a").is_none());
}

#[test]
fn prefetch_is_one_until_ack() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();
    broker.publish("agent-a", json!({"seq": 0})).unwrap();
    broker.publish("agent-a", json!({"seq": 1})).unwrap();

    let first = broker.next_ready("agent-a").unwrap();
    // Second message is withheld while the first is in flight.
    assert!(broker.next_ready("agent-a").is_none());

    broker.ack("agent-a", first.delivery_tag).unwrap();
    assert_eq!(broker.next_ready("agent-a").unwrap().body["seq"], 1);
}

#[test]
fn stale_ack_is_rejected() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();
    broker.publish("agent-a", json!({})).unwrap();
    let msg = broker.next_ready("agent-a").unwrap();
    assert!(!broker.ack("agent-a", msg.delivery_tag + 10).unwrap());
    assert!(broker.ack("agent-a", msg.delivery_tag).unwrap());
}

#[test]
fn unacked_messages_redeliver_after_reset() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();
    broker.publish("agent-a", json!({"seq": 0})).unwrap();

    let first = broker.next_ready("agent-a").unwrap();
    broker.reset_in_flight("agent-a");
    let again = broker.next_ready("agent-a").unwrap();
    assert_eq!(first, again);
}

#[test]
fn spool_survives_restart() {
    let dir = tempdir().unwrap();
    {
        let broker = open(dir.path());
        broker.declare("agent-a").unwrap();
        broker.publish("agent-a", json!({"seq": 0})).unwrap();
        broker.publish("agent-a", json!({"seq": 1})).unwrap();
        let msg = broker.next_ready("agent-a").unwrap();
        broker.ack("agent-a", msg.delivery_tag).unwrap();
    }

    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();
    assert_eq!(broker.pending_count("agent-a"), 1);
    assert_eq!(broker.next_ready("agent-a").unwrap().body["seq"], 1);
}

#[test]
fn inboxes_are_isolated_per_agent() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();
    broker.declare("agent-b").unwrap();
    broker.publish("agent-a", json!({"for": "a"})).unwrap();

    assert!(broker.next_ready("agent-b").is_none());
    assert_eq!(broker.next_ready("agent-a").unwrap().body["for"], "a");
}

#[test]
fn delete_removes_inbox_and_spool() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();
    broker.publish("agent-a", json!({})).unwrap();
    broker.delete("agent-a").unwrap();

    assert!(!broker.has_inbox("agent-a"));
    // A fresh declare starts empty.
    broker.declare("agent-a").unwrap();
    assert_eq!(broker.pending_count("agent-a"), 0);
}

#[test]
fn spool_never_carries_plaintext_credentials() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();
    broker
        .publish(
            "agent-a",
            json!({"type": "init_local_repo", "repo_path": "/var/b", "password": "hunter2"}),
        )
        .unwrap();

    let spool = std::fs::read_to_string(dir.path().join("inbox_agent-a.jsonl")).unwrap();
    assert!(!spool.contains("hunter2"));

    // Delivery hands the agent the plaintext back.
    let msg = broker.next_ready("agent-a").unwrap();
    assert_eq!(msg.body["password"], "hunter2");
}

#[test]
fn declare_is_idempotent_for_a_live_inbox() {
    let dir = tempdir().unwrap();
    let broker = open(dir.path());
    broker.declare("agent-a").unwrap();
    broker.publish("agent-a", json!({})).unwrap();
    broker.declare("agent-a").unwrap();
    assert_eq!(broker.pending_count("agent-a"), 1);
}
