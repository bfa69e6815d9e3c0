// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable scheduler job records.
//!
//! A job is the serialized form of a `schedule_*` task message after
//! validation: the payload to fire, the trigger, the next fire time,
//! remaining repeats, and priority. Records live in the ledger's
//! `schedule_jobs` table and are reloaded on startup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{Interval, Repeats, SchedError, ScheduleMode};
use warden_wire::TaskMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    /// The scheduled task as received; `unscheduled()` is what fires.
    pub task: TaskMessage,
    pub mode: ScheduleMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    pub next_fire: DateTime<Utc>,
    /// `None` means infinite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeats_remaining: Option<u32>,
    pub priority: i32,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Id of this job's row in the schedule ledger, marked done/failed
    /// when the job finishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_row: Option<String>,
}

impl ScheduledJob {
    /// Validate a `schedule_*` task message into a durable job.
    pub fn from_task(task: TaskMessage, now: DateTime<Utc>) -> Result<Self, SchedError> {
        let mode = match task.task_type.schedule {
            Some(mode) => mode,
            None => return Err(SchedError::InvalidScheduler("none".to_string())),
        };
        let repeats = match task.params.get("scheduler_repeats") {
            Some(v) => {
                let raw = v.as_str().ok_or(SchedError::RepeatsMalformed)?;
                Repeats::parse(raw)?
            }
            None => Repeats::Once,
        };
        let priority = match task.params.get("scheduler_priority") {
            Some(v) => v.as_i64().ok_or(SchedError::PriorityMalformed)? as i32,
            None => 0,
        };
        let (interval, next_fire, repeats_remaining) = match mode {
            ScheduleMode::Interval => {
                let interval = task.interval().ok_or(SchedError::IntervalMissing)?;
                if interval.is_zero() {
                    return Err(SchedError::IntervalMissing);
                }
                (Some(interval), now + interval.to_duration(), repeats.remaining())
            }
            ScheduleMode::Timelapse => {
                let at = task
                    .param_str("timelapse")
                    .ok_or(SchedError::TimelapseMalformed)
                    .and_then(warden_core::parse_timelapse)?;
                // Timelapse is one-shot regardless of the repeats input.
                (None, at, Some(1))
            }
        };
        Ok(Self {
            id: nanoid::nanoid!(12),
            task,
            mode,
            interval,
            next_fire,
            repeats_remaining,
            priority,
            status: JobStatus::Active,
            created_at: now,
            ledger_row: None,
        })
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Active && self.next_fire <= now
    }

    /// Advance the job past a firing at `now`.
    pub fn after_fire(&mut self, now: DateTime<Utc>) {
        if let Some(remaining) = self.repeats_remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.status = JobStatus::Done;
                return;
            }
        }
        match (self.mode, self.interval) {
            (ScheduleMode::Interval, Some(interval)) => {
                self.next_fire = now + interval.to_duration();
            }
            // Timelapse jobs have no interval to advance by.
            _ => self.status = JobStatus::Done,
        }
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
