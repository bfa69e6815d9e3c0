// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table storage: JSONL replay on open, appended lines per write.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use warden_core::OpKind;

use crate::jobs::ScheduledJob;
use crate::{JobStatus, LedgerError};

const SCHEDULE_LEDGER: &str = "schedule_ledger";
const SCHEDULE_JOBS: &str = "schedule_jobs";

/// One operation-history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OpRow {
    params: String,
    response: Value,
    response_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Done,
    Failed,
}

/// One schedule-ledger row: a pending scheduled task or a deferred
/// response awaiting flush. Status updates append a superseding row with
/// the same id (last-wins on replay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub status: ScheduleStatus,
}

struct Inner {
    dir: PathBuf,
    /// table name → normalized params → row
    ops: HashMap<&'static str, HashMap<String, OpRow>>,
    schedule: Vec<ScheduleRow>,
    jobs: HashMap<String, ScheduledJob>,
}

/// The agent's durable local store. Cheap to clone; exclusively owned by
/// the agent process.
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<Mutex<Inner>>,
}

impl Ledger {
    /// Open (or create) the ledger under `dir`. Idempotent: missing files
    /// are created lazily, existing ones are replayed.
    pub fn open(dir: &Path) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(dir)?;
        let mut ops: HashMap<&'static str, HashMap<String, OpRow>> = HashMap::new();
        for kind in OpKind::ALL {
            let mut table = HashMap::new();
            for line in read_lines(&table_path(dir, kind.table()))? {
                let row: OpRow = serde_json::from_str(&line)?;
                table.entry(row.params.clone()).or_insert(row);
            }
            ops.insert(kind.table(), table);
        }

        let mut schedule: Vec<ScheduleRow> = Vec::new();
        for line in read_lines(&table_path(dir, SCHEDULE_LEDGER))? {
            let row: ScheduleRow = serde_json::from_str(&line)?;
            match schedule.iter_mut().find(|r| r.id == row.id) {
                Some(existing) => *existing = row,
                None => schedule.push(row),
            }
        }

        let mut jobs = HashMap::new();
        for line in read_lines(&table_path(dir, SCHEDULE_JOBS))? {
            let job: ScheduledJob = serde_json::from_str(&line)?;
            jobs.insert(job.id.clone(), job);
        }

        Ok(Self { inner: Arc::new(Mutex::new(Inner { dir: dir.to_path_buf(), ops, schedule, jobs })) })
    }

    /// Insert an operation row keyed by its normalized params. Returns
    /// `false` (and writes nothing) when an equal key already exists.
    pub fn record_operation(
        &self,
        kind: OpKind,
        normalized_params: &str,
        response: Value,
        at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let table = inner.ops.entry(kind.table()).or_default();
        if table.contains_key(normalized_params) {
            tracing::debug!(table = kind.table(), "duplicate params, skipping insert");
            return Ok(false);
        }
        let row = OpRow {
            params: normalized_params.to_string(),
            response,
            response_timestamp: at,
        };
        let line = serde_json::to_string(&row)?;
        append_line(&table_path(&inner.dir, kind.table()), &line)?;
        table.insert(row.params.clone(), row);
        Ok(true)
    }

    /// Number of rows in an operation table.
    pub fn operation_count(&self, kind: OpKind) -> usize {
        self.inner.lock().ops.get(kind.table()).map_or(0, HashMap::len)
    }

    /// Fetch the stored response for a normalized params key.
    pub fn operation_response(&self, kind: OpKind, normalized_params: &str) -> Option<Value> {
        self.inner
            .lock()
            .ops
            .get(kind.table())
            .and_then(|t| t.get(normalized_params))
            .map(|row| row.response.clone())
    }

    /// Append a schedule-ledger row; returns its id.
    pub fn push_schedule_row(
        &self,
        payload: Value,
        status: ScheduleStatus,
        at: DateTime<Utc>,
    ) -> Result<String, LedgerError> {
        let row = ScheduleRow {
            id: nanoid::nanoid!(12),
            payload,
            created_at: at,
            status,
        };
        let mut inner = self.inner.lock();
        let line = serde_json::to_string(&row)?;
        append_line(&table_path(&inner.dir, SCHEDULE_LEDGER), &line)?;
        let id = row.id.clone();
        inner.schedule.push(row);
        Ok(id)
    }

    /// Supersede a schedule-ledger row's status.
    pub fn mark_schedule_row(&self, id: &str, status: ScheduleStatus) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.schedule.iter().position(|r| r.id == id) else {
            return Ok(());
        };
        let mut row = inner.schedule[pos].clone();
        row.status = status;
        let line = serde_json::to_string(&row)?;
        append_line(&table_path(&inner.dir, SCHEDULE_LEDGER), &line)?;
        inner.schedule[pos] = row;
        Ok(())
    }

    /// Rows with the given status, oldest first.
    pub fn schedule_rows(&self, status: ScheduleStatus) -> Vec<ScheduleRow> {
        self.inner
            .lock()
            .schedule
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    /// Persist a scheduler job record (insert or update, last-wins).
    pub fn upsert_job(&self, job: &ScheduledJob) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let line = serde_json::to_string(job)?;
        append_line(&table_path(&inner.dir, SCHEDULE_JOBS), &line)?;
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    /// Jobs that should keep firing after a restart.
    pub fn load_active_jobs(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self
            .inner
            .lock()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Active)
            .cloned()
            .collect();
        // Higher priority first, then earlier next fire.
        jobs.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.next_fire.cmp(&b.next_fire)));
        jobs
    }
}

fn table_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.jsonl"))
}

fn read_lines(path: &Path) -> Result<Vec<String>, LedgerError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn append_line(path: &Path, line: &str) -> Result<(), LedgerError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
