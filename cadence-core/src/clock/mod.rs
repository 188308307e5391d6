//! Host Clocks
//!
//! Interval timers never sleep or spawn on their own. They ask a
//! [`Scheduler`] for a periodic callback and hand it back when they are
//! done with it. Two schedulers ship with the crate:
//!
//! - [`VirtualClock`]: virtual time advanced by hand. Deterministic, used by
//!   the tests and by hosts that already own an event loop.
//! - [`TokioScheduler`]: real time, one tokio task per periodic callback.
//!
//! # Contract
//!
//! - `set_interval` returns a fresh handle and must not run the callback
//!   before returning. The callback then runs once per period until the
//!   handle is cleared.
//! - `clear_interval` on an unknown or already cleared handle does nothing.
//! - Periods are passed through exactly as the timer resolved them. A
//!   scheduler decides what a zero or negative period means; both shipped
//!   schedulers treat anything below one millisecond as one millisecond.

mod manual;
mod realtime;

use std::fmt;
use std::sync::Arc;

pub use manual::VirtualClock;
pub use realtime::TokioScheduler;

/// Callback invoked by a scheduler on every firing.
pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

/// Identifier of one periodic callback registered with a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a raw scheduler-assigned ID.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// The periodic-timer capability a host provides.
pub trait Scheduler: Send + Sync {
    /// Start invoking `callback` every `period_ms` milliseconds.
    fn set_interval(&self, period_ms: i64, callback: TickCallback) -> TimerHandle;

    /// Stop a periodic callback.
    fn clear_interval(&self, handle: TimerHandle);

    /// Milliseconds on this scheduler's clock.
    fn now(&self) -> u64;
}

/// Smallest period a shipped scheduler will run at.
pub(crate) fn effective_period(period_ms: i64) -> u64 {
    period_ms.max(1) as u64
}
