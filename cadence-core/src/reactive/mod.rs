//! Reactive Primitives
//!
//! This module implements the observation layer the timers plug into:
//! signals, subscribers, effects and ownership scopes.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as an effect), the signal automatically
//! registers that context as an observer. When the signal's value changes,
//! every observer is notified. Interval timers publish their tick count
//! through the same machinery.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever something
//! it read notifies. This is how a host observes `current()` and
//! `tick_count()`.
//!
//! ## Scopes
//!
//! A Scope owns teardown callbacks and runs them when it ends. Timers bound
//! to a scope are disposed with it.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! observers. When a value is read, we check whether a tracking context is
//! active and, if so, register its subscriber with that value.

mod context;
mod effect;
mod scope;
mod signal;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::Effect;
pub use scope::Scope;
pub use signal::{Signal, Subscription};
pub use subscriber::{Subscriber, SubscriberId};

