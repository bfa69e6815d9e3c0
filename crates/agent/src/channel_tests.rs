// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn starts_closed_and_refuses_sends() {
    let channel = Channel::new();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(channel.send("x".into()), Err(ChannelError::NotOpen));
}

#[test]
fn attach_opens_and_delivers() {
    let channel = Channel::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    channel.attach(tx);
    assert!(channel.is_open());
    channel.send("frame".into()).unwrap();
    assert_eq!(rx.try_recv().unwrap(), "frame");
}

#[test]
fn closing_refuses_new_sends() {
    let channel = Channel::new();
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    channel.attach(tx);
    channel.begin_close();
    assert_eq!(channel.state(), ChannelState::Closing);
    assert_eq!(channel.send("late".into()), Err(ChannelError::NotOpen));
}

#[test]
fn detach_closes_fully() {
    let channel = Channel::new();
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    channel.attach(tx);
    channel.detach();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(channel.send("x".into()), Err(ChannelError::NotOpen));
}

#[test]
fn send_fails_when_receiver_is_gone() {
    let channel = Channel::new();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    channel.attach(tx);
    drop(rx);
    assert_eq!(channel.send("x".into()), Err(ChannelError::NotOpen));
}

#[test]
fn begin_close_on_closed_channel_is_a_noop() {
    let channel = Channel::new();
    channel.begin_close();
    assert_eq!(channel.state(), ChannelState::Closed);
}
