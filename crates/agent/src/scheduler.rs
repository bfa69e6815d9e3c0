// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent-side scheduler.
//!
//! Accepts validated `schedule_*` tasks as durable jobs, reloads them on
//! startup, and fires due jobs through the same handler registry as
//! ordinary inbox dispatch. The loop polls once per second so a shutdown
//! signal is observed promptly; in-flight handlers run to completion and
//! nothing new fires after shutdown begins.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use warden_core::{Clock, SchedError};
use warden_ledger::{JobStatus, Ledger, ScheduleStatus, ScheduledJob};
use warden_wire::TaskMessage;

use crate::handlers::HandlerCtx;
use crate::registry::HandlerRegistry;

pub struct Scheduler<C: Clock> {
    ledger: Ledger,
    registry: Arc<HandlerRegistry>,
    ctx: Arc<HandlerCtx>,
    clock: C,
    jobs: Mutex<Vec<ScheduledJob>>,
}

impl<C: Clock> Scheduler<C> {
    /// Create the scheduler, reloading surviving jobs from the ledger.
    pub fn new(
        ledger: Ledger,
        registry: Arc<HandlerRegistry>,
        ctx: Arc<HandlerCtx>,
        clock: C,
    ) -> Self {
        let jobs = ledger.load_active_jobs();
        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "reloaded scheduled jobs");
        }
        Self { ledger, registry, ctx, clock, jobs: Mutex::new(jobs) }
    }

    /// Validate and durably store a `schedule_*` task. Returns the job id.
    pub fn accept(&self, task: TaskMessage) -> Result<String, SchedError> {
        let now = self.clock.now_utc();
        let mut job = ScheduledJob::from_task(task, now)?;
        match self.ledger.push_schedule_row(
            serde_json::to_value(&job.task).unwrap_or_default(),
            ScheduleStatus::Pending,
            now,
        ) {
            Ok(row_id) => job.ledger_row = Some(row_id),
            Err(e) => tracing::error!(%e, "failed to record pending scheduled task"),
        }
        if let Err(e) = self.ledger.upsert_job(&job) {
            tracing::error!(%e, job = %job.id, "failed to persist scheduled job");
        }
        tracing::info!(
            job = %job.id,
            mode = job.mode.as_str(),
            next_fire = %job.next_fire,
            "scheduled task"
        );
        let id = job.id.clone();
        self.jobs.lock().push(job);
        Ok(id)
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Run until shutdown, firing due jobs once per second.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(1)) => self.tick().await,
            }
        }
        tracing::info!("scheduler stopped");
    }

    /// Fire every due job, highest priority first.
    pub async fn tick(&self) {
        let now = self.clock.now_utc();
        let mut due: Vec<ScheduledJob> = {
            let jobs = self.jobs.lock();
            jobs.iter().filter(|j| j.is_due(now)).cloned().collect()
        };
        due.sort_by(|a, b| b.priority.cmp(&a.priority));

        for job in due {
            tracing::info!(job = %job.id, task = %job.task.task_type, "firing scheduled task");
            let handled =
                self.registry.dispatch(self.ctx.clone(), job.task.unscheduled(), true).await;
            self.advance(&job.id, handled);
        }
    }

    fn advance(&self, job_id: &str, handled: bool) {
        let fired_at = self.clock.now_utc();
        let mut jobs = self.jobs.lock();
        let Some(pos) = jobs.iter().position(|j| j.id == job_id) else { return };
        let job = &mut jobs[pos];
        if handled {
            job.after_fire(fired_at);
        } else {
            // No handler for this kind; the job can never succeed.
            tracing::error!(job = %job.id, task = %job.task.task_type, "no handler, failing job");
            job.status = JobStatus::Failed;
        }
        if let Err(e) = self.ledger.upsert_job(job) {
            tracing::error!(%e, job = %job.id, "failed to persist job advance");
        }
        if job.status != JobStatus::Active {
            if let Some(row) = job.ledger_row.clone() {
                let status = match job.status {
                    JobStatus::Failed => ScheduleStatus::Failed,
                    _ => ScheduleStatus::Done,
                };
                if let Err(e) = self.ledger.mark_schedule_row(&row, status) {
                    tracing::warn!(%e, row = %row, "failed to close schedule row");
                }
            }
            jobs.remove(pos);
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
