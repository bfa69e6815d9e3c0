// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical JSON normalization for ledger keying.
//!
//! Two parameter sets are the same ledger row iff their normalized forms
//! are byte-equal: object keys are sorted recursively, array element order
//! is preserved, and the serialization carries no insignificant whitespace.
//! Credential fields must already be replaced by their ciphertext before
//! normalization (the vault does that).

use serde_json::{Map, Value};

/// Canonical serialization of a JSON value.
pub fn normalize(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Rebuild a value with recursively sorted object keys.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "norm_tests.rs"]
mod tests;
