// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disk-backed JSON document collections.
//!
//! Each named collection is an array of JSON documents persisted as one
//! file, written whole through a temp file + rename so a crash never
//! leaves a half-written collection behind. Mutations hold the store
//! lock across the write and rename, so concurrent writers (connection
//! tasks, the retention sweep) cannot overwrite each other's snapshot
//! with a stale one; temp filenames carry a per-write sequence so no two
//! writes ever share one.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("collection file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct DocStore {
    dir: PathBuf,
    collections: Mutex<HashMap<String, Vec<Value>>>,
    tmp_seq: AtomicU64,
}

impl DocStore {
    /// Open the store, loading any existing collection files.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let mut collections = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)?;
            let docs: Vec<Value> = serde_json::from_str(&text)?;
            collections.insert(name.to_string(), docs);
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            collections: Mutex::new(collections),
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// All documents matching the filter.
    pub fn find(&self, collection: &str, filter: impl Fn(&Value) -> bool) -> Vec<Value> {
        self.collections
            .lock()
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter(d)).cloned().collect())
            .unwrap_or_default()
    }

    /// First document matching the filter.
    pub fn find_one(&self, collection: &str, filter: impl Fn(&Value) -> bool) -> Option<Value> {
        self.collections
            .lock()
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter(d)).cloned())
    }

    /// Insert or replace the document matched by `key`. The store lock
    /// is held until the snapshot is on disk.
    pub fn upsert(
        &self,
        collection: &str,
        key: impl Fn(&Value) -> bool,
        doc: Value,
    ) -> Result<(), StoreError> {
        let mut guard = self.collections.lock();
        let docs = guard.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| key(d)) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        self.persist(collection, docs)
    }

    /// Drop documents failing the predicate. Returns how many went. The
    /// store lock is held until the snapshot is on disk.
    pub fn retain(
        &self,
        collection: &str,
        keep: impl Fn(&Value) -> bool,
    ) -> Result<usize, StoreError> {
        let mut guard = self.collections.lock();
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| keep(d));
        let removed = before - docs.len();
        if removed == 0 {
            return Ok(0);
        }
        self.persist(collection, docs)?;
        Ok(removed)
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections.lock().get(collection).map_or(0, Vec::len)
    }

    fn persist(&self, collection: &str, docs: &[Value]) -> Result<(), StoreError> {
        let path = self.dir.join(format!("{collection}.json"));
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .dir
            .join(format!("{collection}.json.tmp.{}.{seq}", std::process::id()));
        std::fs::write(&tmp, serde_json::to_vec_pretty(docs)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "docstore_tests.rs"]
mod tests;
