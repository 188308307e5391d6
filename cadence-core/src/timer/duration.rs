//! Tracked Duration
//!
//! A timer's period is described by a [`DurationSpec`]: either a fixed
//! number of milliseconds or a producer that is asked again on every
//! resolution. Producers are how reactive inputs flow into a timer; a
//! producer that reads a [`Signal`] registers the surrounding observer like
//! any other tracked read.
//!
//! Durations are plain `i64` milliseconds. Zero and negative values are
//! legal here and are handed to the scheduler untouched.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BoxError, Error, Result};
use crate::reactive::Signal;

type Producer = Arc<dyn Fn() -> std::result::Result<i64, BoxError> + Send + Sync>;

/// Source of truth for a timer's period.
#[derive(Clone)]
pub enum DurationSpec {
    /// A fixed period in milliseconds.
    Fixed(i64),
    /// A producer re-evaluated on every resolution.
    Dynamic(Producer),
}

impl DurationSpec {
    /// A period computed by `producer` each time it is needed.
    pub fn from_fn<F>(producer: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(move || Ok(producer())))
    }

    /// A period computed by a producer that may fail.
    ///
    /// The failure surfaces as [`Error::DurationProducer`] from whichever
    /// read triggered the resolution.
    pub fn try_from_fn<F, E>(producer: F) -> Self
    where
        F: Fn() -> std::result::Result<i64, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::Dynamic(Arc::new(move || producer().map_err(Into::into)))
    }

    /// Resolve to the current period. Producers are never cached.
    pub fn resolve(&self) -> Result<i64> {
        match self {
            Self::Fixed(ms) => Ok(*ms),
            Self::Dynamic(producer) => producer().map_err(Error::DurationProducer),
        }
    }

    /// Whether the period can change without an explicit assignment.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

/// Resolve a duration specification to milliseconds.
pub fn resolve(spec: &DurationSpec) -> Result<i64> {
    spec.resolve()
}

impl From<i64> for DurationSpec {
    fn from(ms: i64) -> Self {
        Self::Fixed(ms)
    }
}

impl From<i32> for DurationSpec {
    fn from(ms: i32) -> Self {
        Self::Fixed(i64::from(ms))
    }
}

impl From<u32> for DurationSpec {
    fn from(ms: u32) -> Self {
        Self::Fixed(i64::from(ms))
    }
}

impl From<Duration> for DurationSpec {
    fn from(duration: Duration) -> Self {
        Self::Fixed(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
    }
}

impl From<Signal<i64>> for DurationSpec {
    fn from(signal: Signal<i64>) -> Self {
        Self::from_fn(move || signal.get())
    }
}

impl fmt::Debug for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(ms) => f.debug_tuple("Fixed").field(ms).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
