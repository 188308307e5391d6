//! Cadence Core
//!
//! This crate provides reactive interval timers. It implements:
//!
//! - Interval timers with lazy start, pause/resume/stop and live duration
//!   changes that never lose tick history
//! - Limited timers that complete and pause after a number of ticks
//! - A synchronizer that runs several timers in lockstep with the fastest
//!   one, while each keeps its own pause and completion state
//! - The observation layer timers publish through (signals, effects,
//!   ownership scopes)
//!
//! The crate is designed to be used both as a native Rust library and as a
//! Python extension module via PyO3 (`python` feature).
//!
//! # Architecture
//!
//! - `reactive`: signals, subscribers, effects and scopes
//! - `clock`: the periodic-timer capability timers run on, with virtual and
//!   tokio-backed implementations
//! - `timer`: tracked durations, interval timers, limited timers and the
//!   synchronizer
//! - `config`: serde configuration and snapshots
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_core::clock::VirtualClock;
//! use cadence_core::timer::{sync, IntervalTimer, LimitedInterval};
//!
//! let clock = VirtualClock::shared();
//!
//! let fast = IntervalTimer::new(clock.clone(), 100);
//! let slow = LimitedInterval::new(clock.clone(), 300, 3)?;
//!
//! let group = sync([fast.as_ref(), slow.as_ref()])?;
//! group.enable()?;
//!
//! clock.advance(400);
//! assert_eq!(fast.tick_count()?, 4);
//! assert_eq!(slow.tick_count()?, 3);
//! assert!(slow.is_completed());
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod reactive;
pub mod timer;

#[cfg(feature = "python")]
mod python;

pub use error::{Error, Result};
