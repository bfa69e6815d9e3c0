// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling inputs: interval/timelapse triggers and their validation.
//!
//! Validation failures surface as caller-visible error strings; the exact
//! wording is part of the mutation contract, so the `Display` impls here
//! are load-bearing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Granular repeat interval. Unrealistic denominations (months, years) are
/// deliberately not representable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(default)]
    pub days: u32,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

impl Interval {
    pub fn is_zero(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    pub fn to_duration(&self) -> Duration {
        Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
            + Duration::seconds(i64::from(self.seconds))
    }
}

/// How many times a scheduled task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeats {
    Once,
    Infinite,
    Count(u32),
}

impl Repeats {
    /// Parse the caller-supplied `scheduler_repeats` value.
    pub fn parse(raw: &str) -> Result<Self, SchedError> {
        match raw {
            "once" => Ok(Repeats::Once),
            "infinite" => Ok(Repeats::Infinite),
            other => match other.parse::<i64>() {
                Ok(n) if n > 0 => Ok(Repeats::Count(n as u32)),
                Ok(_) => Err(SchedError::RepeatsOutOfRange),
                Err(_) => Err(SchedError::RepeatsMalformed),
            },
        }
    }

    /// Remaining firings, `None` meaning unbounded.
    pub fn remaining(&self) -> Option<u32> {
        match self {
            Repeats::Once => Some(1),
            Repeats::Infinite => None,
            Repeats::Count(n) => Some(*n),
        }
    }
}

/// Which scheduling trigger a mutation requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Interval,
    Timelapse,
}

impl ScheduleMode {
    pub fn parse(raw: &str) -> Result<Self, SchedError> {
        match raw {
            "interval" => Ok(ScheduleMode::Interval),
            "timelapse" => Ok(ScheduleMode::Timelapse),
            other => Err(SchedError::InvalidScheduler(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleMode::Interval => "interval",
            ScheduleMode::Timelapse => "timelapse",
        }
    }
}

/// A fully validated scheduling request, ready to ride on a task message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePlan {
    pub mode: ScheduleMode,
    pub repeats: Repeats,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timelapse: Option<DateTime<Utc>>,
}

impl SchedulePlan {
    /// Validate and assemble a plan from raw mutation inputs.
    pub fn build(
        scheduler: &str,
        repeats: Option<&str>,
        priority: Option<&str>,
        interval: Option<Interval>,
        timelapse: Option<&str>,
    ) -> Result<Self, SchedError> {
        let mode = ScheduleMode::parse(scheduler)?;
        let repeats = match repeats {
            Some(raw) => Repeats::parse(raw)?,
            None => Repeats::Once,
        };
        let priority = match priority {
            Some(raw) => raw.parse::<i32>().map_err(|_| SchedError::PriorityMalformed)?,
            None => 0,
        };
        match mode {
            ScheduleMode::Interval => {
                let interval = interval.ok_or(SchedError::IntervalMissing)?;
                if interval.is_zero() {
                    return Err(SchedError::IntervalMissing);
                }
                Ok(Self { mode, repeats, priority, interval: Some(interval), timelapse: None })
            }
            ScheduleMode::Timelapse => {
                let raw = timelapse.ok_or(SchedError::TimelapseMalformed)?;
                let at = parse_timelapse(raw)?;
                Ok(Self { mode, repeats, priority, interval: None, timelapse: Some(at) })
            }
        }
    }
}

/// Parse an ISO-8601 date-time and normalize it to UTC.
pub fn parse_timelapse(raw: &str) -> Result<DateTime<Utc>, SchedError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| SchedError::TimelapseMalformed)
}

/// Scheduling validation failures. The `Display` strings are returned
/// verbatim to mutation callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedError {
    #[error("Error: Invalid scheduler {0}")]
    InvalidScheduler(String),

    #[error("Error: 'scheduler_repeats' must be a positive integer or one of 'once' or 'infinite'")]
    RepeatsOutOfRange,

    #[error("Error: 'scheduler_repeats' must be either 'once', 'infinite', or a positive integer")]
    RepeatsMalformed,

    #[error("Error: 'scheduler_priority' must be an integer")]
    PriorityMalformed,

    #[error("Error: 'interval' must specify a non-zero duration")]
    IntervalMissing,

    #[error("Error: Invalid timelapse timestamp")]
    TimelapseMalformed,
}

#[cfg(test)]
#[path = "sched_tests.rs"]
mod tests;
