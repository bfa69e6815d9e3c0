// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation kinds: the cross product of {init, snapshots, backup, restore}
//! and {local, s3} repositories.
//!
//! Every durable table in the agent ledger, every result-store collection,
//! and every wire message type derives its name from one of these kinds.

use serde::{Deserialize, Serialize};

/// What the operation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Init,
    ListSnapshots,
    Backup,
    Restore,
}

/// Which class of repository the operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoClass {
    Local,
    S3,
}

/// One of the eight operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpKind {
    pub verb: Verb,
    pub class: RepoClass,
}

impl OpKind {
    pub const fn new(verb: Verb, class: RepoClass) -> Self {
        Self { verb, class }
    }

    /// All eight kinds, in ledger-table order.
    pub const ALL: [OpKind; 8] = [
        OpKind::new(Verb::Init, RepoClass::Local),
        OpKind::new(Verb::ListSnapshots, RepoClass::Local),
        OpKind::new(Verb::Backup, RepoClass::Local),
        OpKind::new(Verb::Restore, RepoClass::Local),
        OpKind::new(Verb::Init, RepoClass::S3),
        OpKind::new(Verb::ListSnapshots, RepoClass::S3),
        OpKind::new(Verb::Backup, RepoClass::S3),
        OpKind::new(Verb::Restore, RepoClass::S3),
    ];

    /// Durable ledger table name for this kind.
    pub fn table(&self) -> &'static str {
        match (self.class, self.verb) {
            (RepoClass::Local, Verb::Init) => "local_repo_init",
            (RepoClass::Local, Verb::ListSnapshots) => "local_repo_snapshots",
            (RepoClass::Local, Verb::Backup) => "local_repo_backup",
            (RepoClass::Local, Verb::Restore) => "local_repo_restore",
            (RepoClass::S3, Verb::Init) => "s3_repo_init",
            (RepoClass::S3, Verb::ListSnapshots) => "s3_repo_snapshots",
            (RepoClass::S3, Verb::Backup) => "s3_repo_backup",
            (RepoClass::S3, Verb::Restore) => "s3_repo_restore",
        }
    }

    /// Downstream wire `type` for dispatching this kind to an agent.
    ///
    /// `init_s3_repo` and `get_s3_repo_snapshots` run on the controller and
    /// have no downstream spelling; they still carry a task type for
    /// scheduling and ledger purposes.
    pub fn task_type(&self) -> &'static str {
        match (self.class, self.verb) {
            (RepoClass::Local, Verb::Init) => "init_local_repo",
            (RepoClass::Local, Verb::ListSnapshots) => "get_local_repo_snapshots",
            (RepoClass::Local, Verb::Backup) => "do_local_repo_backup",
            (RepoClass::Local, Verb::Restore) => "do_local_repo_restore",
            (RepoClass::S3, Verb::Init) => "init_s3_repo",
            (RepoClass::S3, Verb::ListSnapshots) => "get_s3_repo_snapshots",
            (RepoClass::S3, Verb::Backup) => "do_s3_repo_backup",
            (RepoClass::S3, Verb::Restore) => "do_s3_repo_restore",
        }
    }

    /// Upstream wire `type` for the response to this kind.
    pub fn response_type(&self) -> &'static str {
        match (self.class, self.verb) {
            (RepoClass::Local, Verb::Init) => "response_init_local_repo",
            (RepoClass::Local, Verb::ListSnapshots) => "response_local_repo_snapshots",
            (RepoClass::Local, Verb::Backup) => "response_local_repo_backup",
            (RepoClass::Local, Verb::Restore) => "response_local_repo_restore",
            (RepoClass::S3, Verb::Init) => "response_init_s3_repo",
            (RepoClass::S3, Verb::ListSnapshots) => "response_s3_repo_snapshots",
            (RepoClass::S3, Verb::Backup) => "response_s3_repo_backup",
            (RepoClass::S3, Verb::Restore) => "response_s3_repo_restore",
        }
    }

    /// Parse a downstream task type (without any `schedule_` prefix).
    pub fn from_task_type(s: &str) -> Option<Self> {
        OpKind::ALL.iter().copied().find(|k| k.task_type() == s)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.task_type())
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
