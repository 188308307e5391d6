//! Interval Timer
//!
//! An [`IntervalTimer`] owns at most one periodic callback on its
//! [`Scheduler`] and counts the firings that arrive while it is active.
//!
//! # Lifecycle
//!
//! - Created inert. The first `current()` or `tick_count()` read starts the
//!   underlying timer, unless `IntervalOptions::immediate` started it
//!   during construction.
//! - `pause()` stops counting but leaves the underlying timer running, so
//!   the phase is kept. `resume(true)` drops the old phase and counts one
//!   tick on the spot; the next read starts a fresh phase.
//! - `stop()` is permanent. `dispose()` only drops the live handle; a later
//!   read starts a new one.
//! - The tick count survives pause, resume, duration changes and restarts.
//!
//! # Generations
//!
//! Each live handle remembers the period and generation it was created
//! for. Bumping the generation clears the handle; a read whose resolved
//! period or generation no longer matches creates a new one.
//!
//! # Tick handlers
//!
//! The scheduler callback does not count ticks itself. It looks up the
//! timer's current tick handler at firing time and calls it. Limited timers
//! decorate that handler and synchronizers swap it out, both through the
//! crate-private [`TickControl`] seam.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::{Scheduler, TickCallback, TimerHandle};
use crate::config::TimerSnapshot;
use crate::error::Result;
use crate::reactive::{Scope, Signal, Subscription};

use super::duration::DurationSpec;

/// Function run on every firing of a timer's underlying periodic callback.
pub(crate) type TickHandler = Arc<dyn Fn() + Send + Sync>;

/// Unique identifier of an interval timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntervalId(u64);

impl IntervalId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interval#{}", self.0)
    }
}

/// Construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalOptions {
    /// Start the underlying timer during construction instead of on the
    /// first read.
    #[serde(default)]
    pub immediate: bool,
}

impl IntervalOptions {
    /// Options with `immediate` set.
    pub fn immediate() -> Self {
        Self { immediate: true }
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveTimer {
    handle: TimerHandle,
    period: i64,
    generation: u64,
}

struct IntervalState {
    spec: DurationSpec,
    live: Option<LiveTimer>,
    active: bool,
    stopped: bool,
    generation: u64,
    handler: TickHandler,
}

struct IntervalCore {
    id: IntervalId,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<IntervalState>,
    ticks: Signal<u64>,
}

impl IntervalCore {
    fn count_tick(&self) {
        if !self.state.lock().active {
            return;
        }
        let ticks = self.ticks.update(|count| count + 1);
        tracing::trace!(interval = %self.id, ticks, "tick");
    }

    fn clear(&self, live: Option<LiveTimer>, reason: &'static str) -> bool {
        match live {
            Some(live) => {
                self.scheduler.clear_interval(live.handle);
                tracing::debug!(
                    interval = %self.id,
                    handle = %live.handle,
                    period_ms = live.period,
                    reason,
                    "underlying timer cleared"
                );
                true
            }
            None => false,
        }
    }
}

impl Drop for IntervalCore {
    fn drop(&mut self) {
        let live = self.state.get_mut().live.take();
        self.clear(live, "dropped");
    }
}

/// A controllable periodic timer.
///
/// `IntervalTimer` is a cheap handle: clones share the same timer. When the
/// last handle is dropped the live underlying timer is cleared.
///
/// # Example
///
/// ```rust,ignore
/// let clock = VirtualClock::shared();
/// let timer = IntervalTimer::new(clock.clone(), 100);
///
/// timer.current()?;            // starts the underlying timer
/// clock.advance(250);
/// assert_eq!(timer.tick_count()?, 2);
/// ```
#[derive(Clone)]
pub struct IntervalTimer {
    core: Arc<IntervalCore>,
}

/// Weak counterpart of [`IntervalTimer`], held by tick handlers.
#[derive(Clone)]
pub(crate) struct WeakIntervalTimer {
    core: Weak<IntervalCore>,
}

impl WeakIntervalTimer {
    pub(crate) fn upgrade(&self) -> Option<IntervalTimer> {
        self.core.upgrade().map(|core| IntervalTimer { core })
    }
}

impl IntervalTimer {
    /// Create a timer that starts on its first read.
    pub fn new(scheduler: Arc<dyn Scheduler>, duration: impl Into<DurationSpec>) -> Self {
        let spec = duration.into();
        let core = Arc::new_cyclic(|weak: &Weak<IntervalCore>| {
            let weak = weak.clone();
            let handler: TickHandler = Arc::new(move || {
                if let Some(core) = weak.upgrade() {
                    core.count_tick();
                }
            });
            IntervalCore {
                id: IntervalId::new(),
                scheduler,
                state: Mutex::new(IntervalState {
                    spec,
                    live: None,
                    active: true,
                    stopped: false,
                    generation: 0,
                    handler,
                }),
                ticks: Signal::new(0),
            }
        });
        Self { core }
    }

    /// Create a timer with explicit options.
    ///
    /// Fails only when `immediate` is set and the duration cannot be
    /// resolved.
    pub fn with_options(
        scheduler: Arc<dyn Scheduler>,
        duration: impl Into<DurationSpec>,
        options: IntervalOptions,
    ) -> Result<Self> {
        let timer = Self::new(scheduler, duration);
        if options.immediate {
            timer.ensure_running()?;
        }
        Ok(timer)
    }

    /// The timer's unique ID.
    pub fn id(&self) -> IntervalId {
        self.core.id
    }

    /// Start the underlying timer if needed, observe the timer, and return
    /// the scheduler's current timestamp in milliseconds.
    pub fn current(&self) -> Result<u64> {
        self.ensure_running()?;
        self.core.ticks.track();
        Ok(self.core.scheduler.now())
    }

    /// Start the underlying timer if needed, observe the timer, and return
    /// the number of counted ticks.
    pub fn tick_count(&self) -> Result<u64> {
        self.ensure_running()?;
        Ok(self.core.ticks.get())
    }

    /// Resolve the current duration in milliseconds. Never starts the timer.
    pub fn duration(&self) -> Result<i64> {
        let spec = self.core.state.lock().spec.clone();
        spec.resolve()
    }

    /// Replace the duration specification.
    ///
    /// The tick count and the active flag are untouched. The live
    /// underlying timer is cleared and the next read creates one at the new
    /// period, reporting any producer failure there. Observers are notified
    /// so tracking hosts re-read.
    pub fn set_duration(&self, duration: impl Into<DurationSpec>) {
        self.core.state.lock().spec = duration.into();
        self.bump_generation();
        self.core.ticks.notify();
    }

    /// Whether ticks are currently counted.
    pub fn is_active(&self) -> bool {
        self.core.state.lock().active
    }

    /// Whether `stop()` ended this timer.
    pub fn is_stopped(&self) -> bool {
        let state = self.core.state.lock();
        state.stopped && state.live.is_none()
    }

    /// Whether an underlying timer is live right now.
    pub fn is_running(&self) -> bool {
        self.core.state.lock().live.is_some()
    }

    /// Stop counting ticks. The underlying timer keeps its phase.
    pub fn pause(&self) {
        let changed = {
            let mut state = self.core.state.lock();
            std::mem::replace(&mut state.active, false)
        };
        if changed {
            tracing::debug!(interval = %self.id(), "paused");
            self.core.ticks.notify();
        }
    }

    /// Count ticks again.
    ///
    /// With `immediate`, the old phase is dropped and one tick-handling
    /// pass runs before this returns. The next read starts a new phase.
    pub fn resume(&self, immediate: bool) {
        self.activate();
        if immediate {
            self.bump_generation();
            let handler = self.tick_handler();
            handler();
        }
    }

    /// End the timer for good. Idempotent.
    pub fn stop(&self) {
        let (live, was_stopped) = {
            let mut state = self.core.state.lock();
            state.active = false;
            let was_stopped = std::mem::replace(&mut state.stopped, true);
            (state.live.take(), was_stopped)
        };
        self.core.clear(live, "stopped");
        if !was_stopped {
            tracing::debug!(interval = %self.id(), "stopped");
            self.core.ticks.notify();
        }
    }

    /// Drop the live underlying timer without ending the timer.
    ///
    /// This is the scoped-teardown hook. A later read starts a new
    /// underlying timer.
    pub fn dispose(&self) {
        let live = self.core.state.lock().live.take();
        self.core.clear(live, "disposed");
    }

    /// Dispose this timer when `scope` ends.
    pub fn bind_to(&self, scope: &Scope) {
        let weak = self.downgrade();
        scope.on_cleanup(move || {
            if let Some(timer) = weak.upgrade() {
                timer.dispose();
            }
        });
    }

    /// Call `notify` after every counted tick and every state change,
    /// until the returned subscription is dropped.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.core.ticks.subscribe(notify)
    }

    /// A point-in-time view of the timer that does not start it.
    pub fn snapshot(&self) -> TimerSnapshot {
        let (active, stopped, running) = {
            let state = self.core.state.lock();
            (state.active, state.stopped && state.live.is_none(), state.live.is_some())
        };
        TimerSnapshot {
            id: self.id(),
            duration_ms: self.duration().ok(),
            tick_count: self.core.ticks.get_untracked(),
            active,
            stopped,
            running,
            max_ticks: None,
            remaining_ticks: None,
            completed: None,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakIntervalTimer {
        WeakIntervalTimer {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Set the active flag without touching the underlying timer.
    pub(crate) fn activate(&self) {
        let changed = {
            let mut state = self.core.state.lock();
            !std::mem::replace(&mut state.active, true)
        };
        if changed {
            tracing::debug!(interval = %self.id(), "resumed");
            self.core.ticks.notify();
        }
    }

    /// Make sure a live underlying timer exists for the current period and
    /// generation without registering an observer. Stopped timers never
    /// restart.
    pub(crate) fn ensure_running(&self) -> Result<()> {
        let spec = {
            let state = self.core.state.lock();
            if state.stopped {
                return Ok(());
            }
            state.spec.clone()
        };
        let period = spec.resolve()?;

        let stale = {
            let mut state = self.core.state.lock();
            if state.stopped {
                return Ok(());
            }
            let generation = state.generation;
            if let Some(live) = state.live {
                if live.period == period && live.generation == generation {
                    return Ok(());
                }
            }
            let handle = self.core.scheduler.set_interval(period, self.dispatcher());
            tracing::debug!(
                interval = %self.core.id,
                %handle,
                period_ms = period,
                generation,
                "underlying timer created"
            );
            state.live.replace(LiveTimer {
                handle,
                period,
                generation,
            })
        };
        self.core.clear(stale, "period changed");
        Ok(())
    }

    /// The callback handed to the scheduler. It resolves the tick handler
    /// at firing time so a replaced handler applies to a running timer.
    fn dispatcher(&self) -> TickCallback {
        let weak = Arc::downgrade(&self.core);
        Arc::new(move || {
            let Some(core) = weak.upgrade() else { return };
            let handler = core.state.lock().handler.clone();
            handler();
        })
    }
}

/// Narrow access to a timer's tick machinery for decorators and
/// synchronizers. Not part of the public surface.
pub(crate) trait TickControl {
    /// The handler currently run on each firing.
    fn tick_handler(&self) -> TickHandler;

    /// Replace the handler run on each firing.
    fn set_tick_handler(&self, handler: TickHandler);

    /// The built-in handling: count one tick and notify, if active.
    fn count_tick(&self);

    /// Tick count without starting the timer or registering an observer.
    fn raw_tick_count(&self) -> u64;

    /// Bump the generation and clear the live handle. Returns whether a
    /// handle was live.
    fn bump_generation(&self) -> bool;

    /// Notify observers without counting a tick.
    fn notify_observers(&self);
}

impl TickControl for IntervalTimer {
    fn tick_handler(&self) -> TickHandler {
        self.core.state.lock().handler.clone()
    }

    fn set_tick_handler(&self, handler: TickHandler) {
        self.core.state.lock().handler = handler;
    }

    fn count_tick(&self) {
        self.core.count_tick();
    }

    fn raw_tick_count(&self) -> u64 {
        self.core.ticks.get_untracked()
    }

    fn bump_generation(&self) -> bool {
        let live = {
            let mut state = self.core.state.lock();
            state.generation += 1;
            state.live.take()
        };
        self.core.clear(live, "generation bumped")
    }

    fn notify_observers(&self) {
        self.core.ticks.notify();
    }
}

impl PartialEq for IntervalTimer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for IntervalTimer {}

impl AsRef<IntervalTimer> for IntervalTimer {
    fn as_ref(&self) -> &IntervalTimer {
        self
    }
}

impl fmt::Debug for IntervalTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("IntervalTimer")
            .field("id", &self.core.id)
            .field("spec", &state.spec)
            .field("ticks", &self.core.ticks.get_untracked())
            .field("active", &state.active)
            .field("stopped", &state.stopped)
            .field("generation", &state.generation)
            .field("live", &state.live.map(|live| live.handle))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::error::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    fn setup(duration: impl Into<DurationSpec>) -> (Arc<VirtualClock>, IntervalTimer) {
        let clock = VirtualClock::shared();
        let timer = IntervalTimer::new(clock.clone(), duration);
        (clock, timer)
    }

    #[test]
    fn construction_is_lazy() {
        let (clock, timer) = setup(100);

        assert_eq!(timer.duration().unwrap(), 100);
        assert_eq!(clock.active_timers(), 0);
        assert!(!timer.is_running());

        clock.advance(500);
        assert_eq!(timer.tick_count().unwrap(), 0);
        assert_eq!(clock.active_timers(), 1);
    }

    #[test]
    fn immediate_starts_during_construction() {
        let clock = VirtualClock::shared();
        let timer =
            IntervalTimer::with_options(clock.clone(), 100, IntervalOptions::immediate()).unwrap();

        assert!(timer.is_running());
        clock.advance(300);
        assert_eq!(timer.tick_count().unwrap(), 3);
    }

    #[test]
    fn repeated_reads_reuse_the_handle() {
        let (clock, timer) = setup(50);
        timer.current().unwrap();
        timer.current().unwrap();
        timer.tick_count().unwrap();
        assert_eq!(clock.active_timers(), 1);
        assert_eq!(clock.periods(), vec![50]);
    }

    #[test]
    fn current_returns_clock_time() {
        let (clock, timer) = setup(100);
        assert_eq!(timer.current().unwrap(), 0);
        clock.advance(130);
        assert_eq!(timer.current().unwrap(), 130);
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let (clock, timer) = setup(100);
        timer.current().unwrap();

        clock.advance(200);
        timer.pause();
        clock.advance(300);
        assert_eq!(timer.tick_count().unwrap(), 2);
        assert!(!timer.is_active());
        assert!(timer.is_running());

        timer.resume(false);
        clock.advance(100);
        assert_eq!(timer.tick_count().unwrap(), 3);
    }

    #[test]
    fn resume_immediate_ticks_once_and_restarts_phase() {
        let (clock, timer) = setup(100);
        timer.current().unwrap();
        clock.advance(50);

        timer.pause();
        timer.resume(true);
        assert_eq!(timer.tick_count().unwrap(), 1);

        // the old phase would have fired at t=100
        clock.advance(60);
        assert_eq!(timer.tick_count().unwrap(), 1);
        clock.advance(40);
        assert_eq!(timer.tick_count().unwrap(), 2);
        assert_eq!(clock.active_timers(), 1);
    }

    #[test]
    fn resume_immediate_on_inert_timer_still_ticks() {
        let (clock, timer) = setup(100);
        timer.resume(true);

        assert_eq!(clock.active_timers(), 0);
        assert_eq!(timer.tick_count().unwrap(), 1);
    }

    #[test]
    fn stop_is_permanent_and_idempotent() {
        let (clock, timer) = setup(100);
        timer.current().unwrap();
        clock.advance(100);

        timer.stop();
        timer.stop();
        assert!(timer.is_stopped());
        assert!(!timer.is_active());
        assert_eq!(clock.active_timers(), 0);

        timer.current().unwrap();
        clock.advance(500);
        assert_eq!(timer.tick_count().unwrap(), 1);
        assert_eq!(clock.active_timers(), 0);
    }

    #[test]
    fn never_started_is_not_stopped() {
        let (_clock, timer) = setup(100);
        assert!(!timer.is_stopped());
        assert!(timer.is_active());
    }

    #[test]
    fn dispose_allows_restart() {
        let (clock, timer) = setup(100);
        timer.current().unwrap();
        clock.advance(100);

        timer.dispose();
        assert!(!timer.is_stopped());
        assert_eq!(clock.active_timers(), 0);
        clock.advance(300);

        timer.current().unwrap();
        clock.advance(100);
        assert_eq!(timer.tick_count().unwrap(), 2);
    }

    #[test]
    fn duration_change_recreates_without_reset() {
        let (clock, timer) = setup(100);
        timer.current().unwrap();
        clock.advance(200);

        timer.set_duration(30);
        assert_eq!(timer.duration().unwrap(), 30);
        timer.current().unwrap();
        assert_eq!(clock.periods(), vec![30]);

        clock.advance(90);
        assert_eq!(timer.tick_count().unwrap(), 5);
        assert!(timer.is_active());
    }

    #[test]
    fn duration_change_keeps_pause() {
        let (_clock, timer) = setup(100);
        timer.pause();
        timer.set_duration(200);
        assert!(!timer.is_active());
    }

    #[test]
    fn dynamic_duration_is_reevaluated_on_read() {
        let period = Signal::new(100_i64);
        let (clock, timer) = setup(period.clone());
        timer.current().unwrap();

        period.set(40);
        assert_eq!(timer.duration().unwrap(), 40);
        timer.current().unwrap();
        assert_eq!(clock.periods(), vec![40]);
    }

    #[test]
    fn non_positive_duration_passes_through() {
        let (clock, timer) = setup(-10);
        assert_eq!(timer.duration().unwrap(), -10);
        timer.current().unwrap();
        assert_eq!(clock.periods(), vec![-10]);
    }

    #[test]
    fn producer_failure_surfaces_from_reads() {
        let (clock, timer) = setup(DurationSpec::try_from_fn(|| Err::<i64, _>("offline")));

        assert!(matches!(timer.duration(), Err(Error::DurationProducer(_))));
        assert!(matches!(timer.current(), Err(Error::DurationProducer(_))));
        assert!(matches!(timer.tick_count(), Err(Error::DurationProducer(_))));
        assert_eq!(clock.active_timers(), 0);
    }

    fn flaky_producer(period: i64) -> (Arc<AtomicBool>, DurationSpec) {
        let offline = Arc::new(AtomicBool::new(false));
        let flag = offline.clone();
        let spec = DurationSpec::try_from_fn(move || {
            if flag.load(Ordering::SeqCst) {
                Err("offline")
            } else {
                Ok(period)
            }
        });
        (offline, spec)
    }

    #[test]
    fn resume_immediate_ticks_even_when_producer_fails() {
        let (offline, spec) = flaky_producer(100);
        let (clock, timer) = setup(spec);
        timer.current().unwrap();
        clock.advance(100);

        timer.pause();
        offline.store(true, Ordering::SeqCst);
        timer.resume(true);

        assert!(timer.is_active());
        assert!(!timer.is_running());
        assert_eq!(timer.raw_tick_count(), 2);
        assert!(matches!(timer.tick_count(), Err(Error::DurationProducer(_))));

        offline.store(false, Ordering::SeqCst);
        assert_eq!(timer.tick_count().unwrap(), 2);
        clock.advance(100);
        assert_eq!(timer.tick_count().unwrap(), 3);
    }

    #[test]
    fn failing_duration_is_stored_and_reported_on_read() {
        let (clock, timer) = setup(100);
        timer.current().unwrap();
        clock.advance(100);

        timer.set_duration(DurationSpec::try_from_fn(|| Err::<i64, _>("offline")));
        assert!(!timer.is_running());
        assert_eq!(clock.active_timers(), 0);
        assert!(matches!(timer.duration(), Err(Error::DurationProducer(_))));
        assert!(matches!(timer.current(), Err(Error::DurationProducer(_))));

        timer.set_duration(50);
        timer.current().unwrap();
        assert_eq!(clock.periods(), vec![50]);
        assert_eq!(timer.tick_count().unwrap(), 1);
    }

    #[test]
    fn set_duration_waits_for_the_next_read() {
        let (clock, timer) = setup(100);
        timer.current().unwrap();

        timer.set_duration(40);
        assert_eq!(clock.active_timers(), 0);
        timer.tick_count().unwrap();
        assert_eq!(clock.periods(), vec![40]);
    }

    #[test]
    fn pause_from_inside_a_tick() {
        let (clock, timer) = setup(10);
        let inner = timer.downgrade();
        let _subscription = timer.subscribe(move || {
            if let Some(timer) = inner.upgrade() {
                if timer.raw_tick_count() >= 2 {
                    timer.pause();
                }
            }
        });

        timer.current().unwrap();
        clock.advance(100);
        assert_eq!(timer.tick_count().unwrap(), 2);
        assert!(!timer.is_active());
    }

    #[test]
    fn subscribers_hear_each_counted_tick() {
        let (clock, timer) = setup(100);
        let heard = Arc::new(AtomicUsize::new(0));
        let heard_clone = heard.clone();
        let subscription = timer.subscribe(move || {
            heard_clone.fetch_add(1, Ordering::SeqCst);
        });

        timer.current().unwrap();
        clock.advance(300);
        assert_eq!(heard.load(Ordering::SeqCst), 3);

        drop(subscription);
        clock.advance(300);
        assert_eq!(heard.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropping_last_handle_clears_timer() {
        let (clock, timer) = setup(100);
        timer.current().unwrap();
        assert_eq!(clock.active_timers(), 1);

        drop(timer);
        assert_eq!(clock.active_timers(), 0);
    }

    #[test]
    fn scope_end_disposes() {
        let (clock, timer) = setup(100);
        let scope = Scope::new();
        timer.bind_to(&scope);
        timer.current().unwrap();

        drop(scope);
        assert_eq!(clock.active_timers(), 0);
        assert!(!timer.is_stopped());
    }
}
