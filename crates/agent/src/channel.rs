// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-channel state machine.
//!
//! The channel is explicitly `open`, `closing`, or `closed`; `send`
//! returns `NotOpen` instead of racing on a connection field. The client
//! attaches an outbound queue when the WebSocket is up and detaches it on
//! teardown; callers never see the socket itself.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("control channel is not open")]
    NotOpen,
}

struct Inner {
    state: ChannelState,
    tx: Option<mpsc::UnboundedSender<String>>,
}

/// Shared handle to the upstream direction of the control channel.
pub struct Channel {
    inner: Mutex<Inner>,
}

impl Channel {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { state: ChannelState::Closed, tx: None }) }
    }

    /// Transition to `open` with a fresh outbound queue.
    pub fn attach(&self, tx: mpsc::UnboundedSender<String>) {
        let mut inner = self.inner.lock();
        inner.state = ChannelState::Open;
        inner.tx = Some(tx);
    }

    /// Begin shutdown: sends are refused but the writer may still drain.
    pub fn begin_close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Open {
            inner.state = ChannelState::Closing;
        }
    }

    /// Transition to `closed` and drop the outbound queue.
    pub fn detach(&self) {
        let mut inner = self.inner.lock();
        inner.state = ChannelState::Closed;
        inner.tx = None;
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Queue a frame for the writer task. Fails unless the channel is
    /// fully open.
    pub fn send(&self, text: String) -> Result<(), ChannelError> {
        let inner = self.inner.lock();
        if inner.state != ChannelState::Open {
            return Err(ChannelError::NotOpen);
        }
        match &inner.tx {
            Some(tx) if tx.send(text).is_ok() => Ok(()),
            _ => Err(ChannelError::NotOpen),
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
