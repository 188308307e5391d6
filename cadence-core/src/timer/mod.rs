//! Interval Timers
//!
//! The timer layer, leaves first:
//!
//! - [`duration`]: resolves a fixed or produced duration to milliseconds.
//! - [`IntervalTimer`]: one underlying periodic callback, a tick counter and
//!   pause/resume/stop control.
//! - [`LimitedInterval`]: an interval timer that completes and pauses
//!   after a number of ticks.
//! - [`Synchronizer`]: runs several timers off the shortest one's cadence.

pub mod duration;
mod interval;
mod limited;
mod sync;

pub use duration::{resolve, DurationSpec};
pub use interval::{IntervalId, IntervalOptions, IntervalTimer};
pub use limited::LimitedInterval;
pub use sync::{sync, Synchronizer};
