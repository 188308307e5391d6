//! Limited Timer
//!
//! A [`LimitedInterval`] is an [`IntervalTimer`] with a tick ceiling. It
//! wraps the timer's tick handler: after the built-in counting runs, the
//! ticks counted since the completion baseline are compared against
//! `max_ticks`, and reaching it marks the timer completed and pauses it.
//!
//! The baseline is a snapshot of the cumulative tick count. `reset()` moves
//! it to the current count, so the next completion needs `max_ticks` fresh
//! ticks while the cumulative count keeps growing.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Scheduler;
use crate::config::TimerSnapshot;
use crate::error::{Error, Result};

use super::duration::DurationSpec;
use super::interval::{IntervalOptions, IntervalTimer, TickControl, TickHandler};

#[derive(Debug)]
struct LimitState {
    max_ticks: u64,
    baseline: u64,
    completed: bool,
}

impl LimitState {
    fn remaining(&self, ticks: u64) -> u64 {
        self.max_ticks
            .saturating_sub(ticks.saturating_sub(self.baseline))
    }
}

fn validate_max_ticks(max_ticks: i64) -> Result<u64> {
    if max_ticks <= 0 {
        return Err(Error::invalid_argument(format!(
            "max_ticks must be positive, got {max_ticks}"
        )));
    }
    Ok(max_ticks as u64)
}

/// An interval timer that pauses itself after `max_ticks` ticks.
///
/// Derefs to the wrapped [`IntervalTimer`] for the shared surface
/// (`current`, `tick_count`, `pause`, `stop`, ...).
#[derive(Clone)]
pub struct LimitedInterval {
    timer: IntervalTimer,
    limit: Arc<Mutex<LimitState>>,
}

impl LimitedInterval {
    /// Create a limited timer that starts on its first read.
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        duration: impl Into<DurationSpec>,
        max_ticks: i64,
    ) -> Result<Self> {
        Self::with_options(scheduler, duration, max_ticks, IntervalOptions::default())
    }

    /// Create a limited timer with explicit options.
    pub fn with_options(
        scheduler: Arc<dyn Scheduler>,
        duration: impl Into<DurationSpec>,
        max_ticks: i64,
        options: IntervalOptions,
    ) -> Result<Self> {
        let max_ticks = validate_max_ticks(max_ticks)?;
        let timer = IntervalTimer::new(scheduler, duration);
        let limit = Arc::new(Mutex::new(LimitState {
            max_ticks,
            baseline: 0,
            completed: false,
        }));
        timer.set_tick_handler(limited_handler(&timer, &limit));

        let limited = Self { timer, limit };
        if options.immediate {
            limited.timer.ensure_running()?;
        }
        Ok(limited)
    }

    /// The wrapped interval timer.
    pub fn as_interval(&self) -> &IntervalTimer {
        &self.timer
    }

    /// The current tick ceiling.
    pub fn max_ticks(&self) -> u64 {
        self.limit.lock().max_ticks
    }

    /// Change the tick ceiling. Clears the completed flag but keeps the
    /// baseline, so ticks already counted still count toward the new limit.
    pub fn set_max_ticks(&self, max_ticks: i64) -> Result<()> {
        let max_ticks = validate_max_ticks(max_ticks)?;
        {
            let mut limit = self.limit.lock();
            limit.max_ticks = max_ticks;
            limit.completed = false;
        }
        self.timer.notify_observers();
        Ok(())
    }

    /// Whether the ceiling was reached since the last reset.
    pub fn is_completed(&self) -> bool {
        self.limit.lock().completed
    }

    /// Ticks left before completion. Starts the timer like `tick_count()`.
    pub fn remaining_ticks(&self) -> Result<u64> {
        let ticks = self.timer.tick_count()?;
        Ok(self.limit.lock().remaining(ticks))
    }

    /// Start a new completion window at the current tick count and resume
    /// if paused. The cumulative tick count is untouched.
    pub fn reset(&self) {
        let ticks = self.timer.raw_tick_count();
        {
            let mut limit = self.limit.lock();
            limit.completed = false;
            limit.baseline = ticks;
        }
        tracing::debug!(interval = %self.timer.id(), baseline = ticks, "limit reset");
        if self.timer.is_active() {
            self.timer.notify_observers();
        } else {
            self.timer.activate();
        }
    }

    /// A point-in-time view that does not start the timer.
    pub fn snapshot(&self) -> TimerSnapshot {
        let mut snapshot = self.timer.snapshot();
        let limit = self.limit.lock();
        snapshot.max_ticks = Some(limit.max_ticks);
        snapshot.remaining_ticks = Some(limit.remaining(snapshot.tick_count));
        snapshot.completed = Some(limit.completed);
        snapshot
    }
}

/// Wrap the timer's built-in handling with the ceiling check.
fn limited_handler(timer: &IntervalTimer, limit: &Arc<Mutex<LimitState>>) -> TickHandler {
    let weak = timer.downgrade();
    let limit = Arc::clone(limit);
    Arc::new(move || {
        let Some(timer) = weak.upgrade() else { return };
        if limit.lock().completed {
            return;
        }

        timer.count_tick();

        let ticks = timer.raw_tick_count();
        let reached = {
            let mut limit = limit.lock();
            let reached = !limit.completed && limit.remaining(ticks) == 0;
            if reached {
                limit.completed = true;
            }
            reached
        };
        if reached {
            tracing::debug!(interval = %timer.id(), ticks, "tick limit reached");
            timer.pause();
        }
    })
}

impl Deref for LimitedInterval {
    type Target = IntervalTimer;

    fn deref(&self) -> &IntervalTimer {
        &self.timer
    }
}

impl AsRef<IntervalTimer> for LimitedInterval {
    fn as_ref(&self) -> &IntervalTimer {
        &self.timer
    }
}

impl fmt::Debug for LimitedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitedInterval")
            .field("timer", &self.timer)
            .field("limit", &*self.limit.lock())
            .finish()
    }
}
