// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Downstream task messages.
//!
//! A task message is a `type` string plus the operation parameters
//! at the top level of the object, exactly as the dispatcher publishes
//! them. Scheduled variants prefix the type with `schedule_interval_` or
//! `schedule_timelapse_` and enrich the payload with the validated
//! scheduling fields.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use warden_core::{Interval, OpKind, Repeats, ScheduleMode};

use crate::WireError;

/// The `type` of a downstream task: an operation kind, optionally wrapped
/// in a scheduling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskType {
    pub kind: OpKind,
    pub schedule: Option<ScheduleMode>,
}

impl TaskType {
    pub fn immediate(kind: OpKind) -> Self {
        Self { kind, schedule: None }
    }

    pub fn scheduled(kind: OpKind, mode: ScheduleMode) -> Self {
        Self { kind, schedule: Some(mode) }
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn parse(s: &str) -> Result<Self, WireError> {
        let (schedule, base) = if let Some(rest) = s.strip_prefix("schedule_interval_") {
            (Some(ScheduleMode::Interval), rest)
        } else if let Some(rest) = s.strip_prefix("schedule_timelapse_") {
            (Some(ScheduleMode::Timelapse), rest)
        } else {
            (None, s)
        };
        let kind =
            OpKind::from_task_type(base).ok_or_else(|| WireError::UnknownType(s.to_string()))?;
        Ok(Self { kind, schedule })
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.schedule {
            Some(ScheduleMode::Interval) => write!(f, "schedule_interval_{}", self.kind),
            Some(ScheduleMode::Timelapse) => write!(f, "schedule_timelapse_{}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl Serialize for TaskType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TaskType::parse(&s).map_err(D::Error::custom)
    }
}

/// A downstream job message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl TaskMessage {
    pub fn new(task_type: TaskType, params: Map<String, Value>) -> Self {
        Self { task_type, params }
    }

    /// The operation parameters as a JSON object value (for normalization
    /// and ledger storage).
    pub fn params_value(&self) -> Value {
        Value::Object(self.params.clone())
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(Value::as_bool)
    }

    pub fn param_strings(&self, key: &str) -> Vec<String> {
        self.params
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            })
            .unwrap_or_default()
    }

    /// Scheduling enrichment riding on the message, if any.
    pub fn interval(&self) -> Option<Interval> {
        self.params
            .get("interval")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn timelapse(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.param_str("timelapse")
            .and_then(|s| warden_core::parse_timelapse(s).ok())
    }

    pub fn repeats(&self) -> Option<Repeats> {
        self.param_str("scheduler_repeats").and_then(|s| Repeats::parse(s).ok())
    }

    pub fn priority(&self) -> i32 {
        self.params
            .get("scheduler_priority")
            .and_then(Value::as_i64)
            .map(|n| n as i32)
            .unwrap_or(0)
    }

    /// The same message with any scheduling wrapper removed, as fired by
    /// the agent scheduler.
    pub fn unscheduled(&self) -> TaskMessage {
        let mut params = self.params.clone();
        for key in ["interval", "timelapse", "scheduler_repeats", "scheduler_priority"] {
            params.remove(key);
        }
        TaskMessage { task_type: TaskType::immediate(self.task_type.kind), params }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
