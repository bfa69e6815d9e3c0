// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task-type → handler registry.
//!
//! Built once at startup. The registry is the neutral seam between the
//! channel client, the scheduler, and the handlers: both dispatch paths
//! depend on it, it depends on neither. New kinds are added by
//! registering a pair, not by subclassing anything.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use warden_wire::TaskMessage;

use crate::handlers::{cloud, local, HandlerCtx};

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type Handler = fn(Arc<HandlerCtx>, TaskMessage, bool) -> HandlerFuture;

pub struct HandlerRegistry {
    table: HashMap<&'static str, Handler>,
}

impl HandlerRegistry {
    /// Register the full downstream handler set.
    pub fn build() -> Self {
        let mut table: HashMap<&'static str, Handler> = HashMap::new();
        table.insert("init_local_repo", |ctx, task, s| {
            Box::pin(local::init_local_repo(ctx, task, s))
        });
        table.insert("get_local_repo_snapshots", |ctx, task, s| {
            Box::pin(local::get_local_repo_snapshots(ctx, task, s))
        });
        table.insert("do_local_repo_backup", |ctx, task, s| {
            Box::pin(local::do_local_repo_backup(ctx, task, s))
        });
        table.insert("do_local_repo_restore", |ctx, task, s| {
            Box::pin(local::do_local_repo_restore(ctx, task, s))
        });
        table.insert("do_s3_repo_backup", |ctx, task, s| {
            Box::pin(cloud::do_s3_repo_backup(ctx, task, s))
        });
        table.insert("do_s3_repo_restore", |ctx, task, s| {
            Box::pin(cloud::do_s3_repo_restore(ctx, task, s))
        });
        Self { table }
    }

    /// Run the handler for a task's base type. Returns `false` for task
    /// types with no registered handler.
    pub async fn dispatch(&self, ctx: Arc<HandlerCtx>, task: TaskMessage, scheduled: bool) -> bool {
        let key = task.task_type.kind.task_type();
        match self.table.get(key) {
            Some(handler) => {
                handler(ctx, task, scheduled).await;
                true
            }
            None => {
                tracing::warn!(task_type = key, "no handler registered");
                false
            }
        }
    }

    pub fn handles(&self, task_type: &str) -> bool {
        self.table.contains_key(task_type)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
