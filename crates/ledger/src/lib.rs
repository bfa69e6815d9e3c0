// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-ledger: the agent's durable local store.
//!
//! One append-only JSONL table per operation kind holding
//! `(normalize(params), response, timestamp)` rows, a `schedule_ledger`
//! table for pending scheduled tasks and deferred responses, and a
//! `schedule_jobs` table backing the scheduler across restarts. Files are
//! replayed into memory on open; every write is a single appended line
//! followed by a flush.

mod jobs;
mod store;

pub use jobs::{JobStatus, ScheduledJob};
pub use store::{Ledger, ScheduleRow, ScheduleStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("ledger row is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
