// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;

fn t0() -> DateTime<Utc> {
    Utc::now()
}

#[test]
fn fresh_record_is_connected_without_disconnect_timestamp() {
    let rec = LivenessRecord::connected("uuid-a", "acme", t0());
    assert!(rec.is_connected());
    assert!(rec.connected_at.is_some());
    assert!(rec.last_disconnected_at.is_none());
}

#[test]
fn disconnect_then_reconnect_keeps_timestamps_in_agreement() {
    let start = t0();
    let mut rec = LivenessRecord::connected("uuid-a", "acme", start);

    rec.on_disconnect(start + Duration::seconds(10));
    assert!(!rec.is_connected());
    assert!(rec.last_disconnected_at.unwrap() > rec.connected_at.unwrap());

    rec.on_connect("acme", start + Duration::seconds(20));
    assert!(rec.is_connected());
    assert!(rec.connected_at.unwrap() >= rec.last_disconnected_at.unwrap());
}

#[test]
fn disconnected_for_measures_from_last_disconnect() {
    let start = t0();
    let mut rec = LivenessRecord::connected("uuid-a", "acme", start);
    rec.on_disconnect(start + Duration::seconds(5));

    let gone = rec.disconnected_for(start + Duration::seconds(65)).unwrap();
    assert_eq!(gone, Duration::seconds(60));
}

#[test]
fn disconnected_for_is_none_while_connected() {
    let rec = LivenessRecord::connected("uuid-a", "acme", t0());
    assert!(rec.disconnected_for(t0()).is_none());
}

#[test]
fn reconnect_updates_org() {
    let mut rec = LivenessRecord::connected("uuid-a", "acme", t0());
    rec.on_disconnect(t0());
    rec.on_connect("globex", t0());
    assert_eq!(rec.org, "globex");
}
