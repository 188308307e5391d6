//! Declarative timer configuration and serialisable snapshots.
//!
//! Hosts that describe timers in data (JSON documents, Python dicts) build
//! them through [`IntervalConfig`], and read them back through
//! [`TimerSnapshot`], which never starts a timer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Scheduler;
use crate::error::Result;
use crate::timer::{IntervalId, IntervalOptions, IntervalTimer, LimitedInterval};

/// Data description of one timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Period in milliseconds. Passed through unvalidated.
    pub duration_ms: i64,

    /// Start the underlying timer at construction.
    #[serde(default)]
    pub immediate: bool,

    /// Tick ceiling; builds a [`LimitedInterval`] when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<i64>,
}

impl IntervalConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the described timer on `scheduler`.
    pub fn build(&self, scheduler: Arc<dyn Scheduler>) -> Result<Timer> {
        let options = IntervalOptions {
            immediate: self.immediate,
        };
        match self.max_ticks {
            Some(max_ticks) => Ok(Timer::Limited(LimitedInterval::with_options(
                scheduler,
                self.duration_ms,
                max_ticks,
                options,
            )?)),
            None => Ok(Timer::Plain(IntervalTimer::with_options(
                scheduler,
                self.duration_ms,
                options,
            )?)),
        }
    }
}

/// A timer built from an [`IntervalConfig`].
#[derive(Debug, Clone)]
pub enum Timer {
    Plain(IntervalTimer),
    Limited(LimitedInterval),
}

impl Timer {
    /// The underlying interval timer.
    pub fn interval(&self) -> &IntervalTimer {
        match self {
            Self::Plain(timer) => timer,
            Self::Limited(limited) => limited.as_interval(),
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        match self {
            Self::Plain(timer) => timer.snapshot(),
            Self::Limited(limited) => limited.snapshot(),
        }
    }
}

impl AsRef<IntervalTimer> for Timer {
    fn as_ref(&self) -> &IntervalTimer {
        self.interval()
    }
}

/// Point-in-time view of a timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub id: IntervalId,
    /// `None` when the duration producer failed.
    pub duration_ms: Option<i64>,
    pub tick_count: u64,
    pub active: bool,
    pub stopped: bool,
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ticks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TimerSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encode as MessagePack with field names, for binary host channels.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }
}
