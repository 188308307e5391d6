//! Python Bindings
//!
//! Thin PyO3 wrappers over the timer types, built with the `python`
//! feature. Python hosts drive time through `VirtualClock.advance`, which
//! fits an asyncio or game loop that owns its own schedule.
//!
//! Durations may be an `int` or a zero-argument callable returning one.
//! The callable is invoked with the GIL held on every resolution, and an
//! exception it raises comes back out of the read that triggered it with
//! its own type.

use std::sync::Arc;

use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyTuple;

use crate::clock::{Scheduler, VirtualClock};
use crate::error::Error;
use crate::timer::{
    self, DurationSpec, IntervalId, IntervalOptions, IntervalTimer, LimitedInterval, Synchronizer,
};

impl From<Error> for PyErr {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument(message) => PyValueError::new_err(message),
            other => match other.downcast_producer::<PyErr>() {
                Ok(raised) => raised,
                Err(other) => PyRuntimeError::new_err(other.to_string()),
            },
        }
    }
}

fn duration_from_py(duration: &Bound<'_, PyAny>) -> PyResult<DurationSpec> {
    if let Ok(ms) = duration.extract::<i64>() {
        return Ok(DurationSpec::Fixed(ms));
    }
    if duration.is_callable() {
        let producer: Py<PyAny> = duration.clone().unbind();
        return Ok(DurationSpec::try_from_fn(move || {
            Python::with_gil(|py| producer.call0(py)?.extract::<i64>(py))
        }));
    }
    Err(PyTypeError::new_err("duration must be an int or a callable returning an int"))
}

/// Python-exposed virtual clock.
#[pyclass(name = "VirtualClock")]
pub struct PyVirtualClock {
    clock: Arc<VirtualClock>,
}

#[pymethods]
impl PyVirtualClock {
    #[new]
    fn new() -> Self {
        Self {
            clock: VirtualClock::shared(),
        }
    }

    /// Move time forward, firing every timer that falls due.
    fn advance(&self, py: Python<'_>, ms: u64) {
        let clock = Arc::clone(&self.clock);
        py.allow_threads(move || clock.advance(ms));
    }

    #[getter]
    fn now(&self) -> u64 {
        self.clock.now()
    }

    #[getter]
    fn active_timers(&self) -> usize {
        self.clock.active_timers()
    }

    fn __repr__(&self) -> String {
        format!(
            "VirtualClock(now={}, timers={})",
            self.clock.now(),
            self.clock.active_timers()
        )
    }
}

/// Python-exposed interval timer.
#[pyclass(name = "Interval")]
pub struct PyInterval {
    timer: IntervalTimer,
}

#[pymethods]
impl PyInterval {
    #[new]
    #[pyo3(signature = (clock, duration, immediate = false))]
    fn new(clock: &PyVirtualClock, duration: &Bound<'_, PyAny>, immediate: bool) -> PyResult<Self> {
        let timer = IntervalTimer::with_options(
            clock.clock.clone(),
            duration_from_py(duration)?,
            IntervalOptions { immediate },
        )?;
        Ok(Self { timer })
    }

    #[getter]
    fn current(&self) -> PyResult<u64> {
        Ok(self.timer.current()?)
    }

    #[getter]
    fn tick_count(&self) -> PyResult<u64> {
        Ok(self.timer.tick_count()?)
    }

    #[getter]
    fn duration(&self) -> PyResult<i64> {
        Ok(self.timer.duration()?)
    }

    #[setter]
    fn set_duration(&self, duration: &Bound<'_, PyAny>) -> PyResult<()> {
        self.timer.set_duration(duration_from_py(duration)?);
        Ok(())
    }

    #[getter]
    fn is_active(&self) -> bool {
        self.timer.is_active()
    }

    #[getter]
    fn is_stopped(&self) -> bool {
        self.timer.is_stopped()
    }

    fn pause(&self) {
        self.timer.pause();
    }

    #[pyo3(signature = (immediate = false))]
    fn resume(&self, immediate: bool) {
        self.timer.resume(immediate);
    }

    fn stop(&self) {
        self.timer.stop();
    }

    fn dispose(&self) {
        self.timer.dispose();
    }

    fn snapshot(&self) -> PyResult<String> {
        Ok(self.timer.snapshot().to_json()?)
    }

    fn __enter__(slf: Py<Self>) -> Py<Self> {
        slf
    }

    fn __exit__(
        &self,
        _exc_type: Option<&Bound<'_, PyAny>>,
        _exc: Option<&Bound<'_, PyAny>>,
        _tb: Option<&Bound<'_, PyAny>>,
    ) -> bool {
        self.timer.dispose();
        false
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.timer)
    }
}

/// Python-exposed limited interval timer.
#[pyclass(name = "LimitedInterval")]
pub struct PyLimitedInterval {
    timer: LimitedInterval,
}

#[pymethods]
impl PyLimitedInterval {
    #[new]
    #[pyo3(signature = (clock, duration, max_ticks, immediate = false))]
    fn new(
        clock: &PyVirtualClock,
        duration: &Bound<'_, PyAny>,
        max_ticks: i64,
        immediate: bool,
    ) -> PyResult<Self> {
        let timer = LimitedInterval::with_options(
            clock.clock.clone(),
            duration_from_py(duration)?,
            max_ticks,
            IntervalOptions { immediate },
        )?;
        Ok(Self { timer })
    }

    #[getter]
    fn current(&self) -> PyResult<u64> {
        Ok(self.timer.current()?)
    }

    #[getter]
    fn tick_count(&self) -> PyResult<u64> {
        Ok(self.timer.tick_count()?)
    }

    #[getter]
    fn duration(&self) -> PyResult<i64> {
        Ok(self.timer.duration()?)
    }

    #[setter]
    fn set_duration(&self, duration: &Bound<'_, PyAny>) -> PyResult<()> {
        self.timer.set_duration(duration_from_py(duration)?);
        Ok(())
    }

    #[getter]
    fn max_ticks(&self) -> u64 {
        self.timer.max_ticks()
    }

    #[setter]
    fn set_max_ticks(&self, max_ticks: i64) -> PyResult<()> {
        Ok(self.timer.set_max_ticks(max_ticks)?)
    }

    #[getter]
    fn is_active(&self) -> bool {
        self.timer.is_active()
    }

    #[getter]
    fn is_stopped(&self) -> bool {
        self.timer.is_stopped()
    }

    #[getter]
    fn is_completed(&self) -> bool {
        self.timer.is_completed()
    }

    #[getter]
    fn remaining_ticks(&self) -> PyResult<u64> {
        Ok(self.timer.remaining_ticks()?)
    }

    fn pause(&self) {
        self.timer.pause();
    }

    #[pyo3(signature = (immediate = false))]
    fn resume(&self, immediate: bool) {
        self.timer.resume(immediate);
    }

    fn reset(&self) {
        self.timer.reset();
    }

    fn stop(&self) {
        self.timer.stop();
    }

    fn dispose(&self) {
        self.timer.dispose();
    }

    fn snapshot(&self) -> PyResult<String> {
        Ok(self.timer.snapshot().to_json()?)
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.timer)
    }
}

/// Python-exposed synchronizer.
#[pyclass(name = "Synchronizer")]
pub struct PySynchronizer {
    inner: Synchronizer,
    members: Vec<(IntervalId, Py<PyAny>)>,
}

#[pymethods]
impl PySynchronizer {
    /// The leading member, as the object passed to `sync()`.
    #[getter]
    fn leader(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        let id = self.inner.leader().id();
        self.members
            .iter()
            .find(|(member, _)| *member == id)
            .map(|(_, object)| object.clone_ref(py))
            .ok_or_else(|| PyRuntimeError::new_err("leader is not a member"))
    }

    /// ID of the leading member.
    #[getter]
    fn leader_id(&self) -> u64 {
        self.inner.leader().id().raw()
    }

    #[getter]
    fn is_synced(&self) -> bool {
        self.inner.is_synced()
    }

    fn enable(&self) -> PyResult<()> {
        Ok(self.inner.enable()?)
    }

    fn disable(&self) -> PyResult<()> {
        Ok(self.inner.disable()?)
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.inner)
    }
}

/// Synchronize `Interval` and `LimitedInterval` objects.
#[pyfunction]
#[pyo3(signature = (*members))]
fn sync(members: &Bound<'_, PyTuple>) -> PyResult<PySynchronizer> {
    let mut timers = Vec::with_capacity(members.len());
    let mut objects = Vec::with_capacity(members.len());
    for member in members.iter() {
        let timer = if let Ok(interval) = member.downcast::<PyInterval>() {
            interval.borrow().timer.clone()
        } else if let Ok(limited) = member.downcast::<PyLimitedInterval>() {
            limited.borrow().timer.as_interval().clone()
        } else {
            return Err(PyTypeError::new_err(
                "sync() members must be Interval or LimitedInterval",
            ));
        };
        objects.push((timer.id(), member.clone().unbind()));
        timers.push(timer);
    }
    Ok(PySynchronizer {
        inner: timer::sync(timers)?,
        members: objects,
    })
}

/// Python module definition.
///
/// This function is called by Python when importing the module.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyVirtualClock>()?;
    m.add_class::<PyInterval>()?;
    m.add_class::<PyLimitedInterval>()?;
    m.add_class::<PySynchronizer>()?;
    m.add_function(wrap_pyfunction!(sync, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
