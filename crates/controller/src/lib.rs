// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-controller: the central control plane.
//!
//! Accepts agent control channels, provisions per-agent durable inboxes,
//! dispatches mutations as durable job messages, persists operation
//! results, answers the query surface, runs the DR watchdog, and issues
//! agent bearer tokens.

pub mod auth;
pub mod broker;
pub mod conn;
pub mod dispatch;
pub mod docstore;
pub mod dr;
pub mod env;
pub mod http;
pub mod lifecycle;
pub mod liveness;
pub mod queries;
pub mod results;
pub mod s3ops;

pub use auth::AuthService;
pub use broker::{Broker, BrokerError, PendingMessage};
pub use conn::ConnCtx;
pub use dispatch::Mutations;
pub use docstore::{DocStore, StoreError};
pub use dr::{DrMonitor, DrPolicy, PolicyError, RestoreWorkflow};
pub use liveness::LivenessStore;
pub use queries::Queries;
pub use results::ResultStore;
