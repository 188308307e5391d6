//! Virtual-time scheduler.
//!
//! Time only moves when [`VirtualClock::advance`] is called. Every firing
//! that falls inside the advanced window runs in due-time order, with
//! earlier-registered timers first on ties, and `now()` reads the due time
//! of the firing being delivered.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{effective_period, Scheduler, TickCallback, TimerHandle};

struct VirtualTimer {
    period: u64,
    requested_period: i64,
    next_due: u64,
    callback: TickCallback,
}

#[derive(Default)]
struct ClockState {
    now: u64,
    next_handle: u64,
    timers: BTreeMap<TimerHandle, VirtualTimer>,
}

/// A [`Scheduler`] driven by explicit calls to [`advance`](Self::advance).
#[derive(Default)]
pub struct VirtualClock {
    state: Mutex<ClockState>,
}

impl VirtualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at time zero, ready to share between timers.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Move time forward by `ms`, delivering every firing that falls due.
    ///
    /// Callbacks run with no clock lock held, so they may register or clear
    /// timers. A timer registered during the window fires inside it if its
    /// first due time is reached.
    pub fn advance(&self, ms: u64) {
        let target = self.state.lock().now.saturating_add(ms);

        loop {
            let callback = {
                let mut state = self.state.lock();
                let due = state
                    .timers
                    .iter()
                    .filter(|(_, timer)| timer.next_due <= target)
                    .min_by_key(|(handle, timer)| (timer.next_due, **handle))
                    .map(|(handle, _)| *handle);

                let Some(handle) = due else { break };
                let Some(timer) = state.timers.get_mut(&handle) else { break };
                let fired_at = timer.next_due;
                timer.next_due += timer.period;
                let callback = timer.callback.clone();
                state.now = fired_at;
                callback
            };
            callback();
        }

        self.state.lock().now = target;
    }

    /// Number of registered periodic callbacks.
    pub fn active_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Whether `handle` is still registered.
    pub fn is_registered(&self, handle: TimerHandle) -> bool {
        self.state.lock().timers.contains_key(&handle)
    }

    /// The period `handle` was registered with, before clamping.
    pub fn period_of(&self, handle: TimerHandle) -> Option<i64> {
        self.state
            .lock()
            .timers
            .get(&handle)
            .map(|timer| timer.requested_period)
    }

    /// Periods of every registered callback, in registration order.
    pub fn periods(&self) -> Vec<i64> {
        self.state
            .lock()
            .timers
            .values()
            .map(|timer| timer.requested_period)
            .collect()
    }
}

impl Scheduler for VirtualClock {
    fn set_interval(&self, period_ms: i64, callback: TickCallback) -> TimerHandle {
        let mut state = self.state.lock();
        let handle = TimerHandle::from_raw(state.next_handle);
        state.next_handle += 1;

        let period = effective_period(period_ms);
        let next_due = state.now + period;
        state.timers.insert(
            handle,
            VirtualTimer {
                period,
                requested_period: period_ms,
                next_due,
                callback,
            },
        );
        tracing::trace!(%handle, period_ms, next_due, "virtual interval registered");
        handle
    }

    fn clear_interval(&self, handle: TimerHandle) {
        if self.state.lock().timers.remove(&handle).is_some() {
            tracing::trace!(%handle, "virtual interval cleared");
        }
    }

    fn now(&self) -> u64 {
        self.state.lock().now
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("VirtualClock")
            .field("now", &state.now)
            .field("timers", &state.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TickCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let callback: TickCallback = Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn fires_once_per_period() {
        let clock = VirtualClock::new();
        let (count, callback) = counter();
        clock.set_interval(100, callback);

        clock.advance(99);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        clock.advance(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        clock.advance(250);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(clock.now(), 350);
    }

    #[test]
    fn cleared_timer_stops_firing() {
        let clock = VirtualClock::new();
        let (count, callback) = counter();
        let handle = clock.set_interval(50, callback);

        clock.advance(100);
        clock.clear_interval(handle);
        clock.clear_interval(handle);
        clock.advance(100);

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!clock.is_registered(handle));
        assert_eq!(clock.active_timers(), 0);
    }

    #[test]
    fn firings_are_ordered_by_due_time() {
        let clock = Arc::new(VirtualClock::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, period) in [("slow", 30_i64), ("fast", 20)] {
            let order = order.clone();
            let clock_ref = clock.clone();
            clock.set_interval(
                period,
                Arc::new(move || order.lock().push((label, clock_ref.now()))),
            );
        }

        clock.advance(60);
        assert_eq!(
            *order.lock(),
            vec![("fast", 20), ("slow", 30), ("fast", 40), ("slow", 60), ("fast", 60)]
        );
    }

    #[test]
    fn zero_period_is_clamped_but_reported() {
        let clock = VirtualClock::new();
        let (count, callback) = counter();
        let handle = clock.set_interval(0, callback);

        clock.advance(5);
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(clock.period_of(handle), Some(0));
    }

    #[test]
    fn callback_may_clear_itself() {
        let clock = Arc::new(VirtualClock::new());
        let count = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(None::<TimerHandle>));

        let clock_ref = clock.clone();
        let count_clone = count.clone();
        let slot_clone = slot.clone();
        let handle = clock.set_interval(
            10,
            Arc::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
                if let Some(handle) = *slot_clone.lock() {
                    clock_ref.clear_interval(handle);
                }
            }),
        );
        *slot.lock() = Some(handle);

        clock.advance(100);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
