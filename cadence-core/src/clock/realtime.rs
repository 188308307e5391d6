//! Real-time scheduler on top of tokio.
//!
//! Every periodic callback is a spawned task looping over a
//! [`tokio::time::Interval`]. Clearing the handle aborts the task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{effective_period, Scheduler, TickCallback, TimerHandle};

/// A [`Scheduler`] that runs callbacks on a tokio runtime.
pub struct TokioScheduler {
    runtime: Handle,
    origin: Instant,
    next_handle: AtomicU64,
    tasks: DashMap<TimerHandle, AbortHandle>,
}

impl TokioScheduler {
    /// Create a scheduler that spawns onto `runtime`.
    ///
    /// `now()` counts milliseconds from this call.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            origin: Instant::now(),
            next_handle: AtomicU64::new(0),
            tasks: DashMap::new(),
        }
    }

    /// Create a scheduler for the runtime this thread is running on.
    pub fn from_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    /// Number of live periodic tasks.
    pub fn active_timers(&self) -> usize {
        self.tasks.len()
    }
}

impl Scheduler for TokioScheduler {
    fn set_interval(&self, period_ms: i64, callback: TickCallback) -> TimerHandle {
        let handle = TimerHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let period = Duration::from_millis(effective_period(period_ms));
        let first = Instant::now() + period;

        let task = self.runtime.spawn(async move {
            let mut ticker = time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                callback();
            }
        });

        self.tasks.insert(handle, task.abort_handle());
        tracing::trace!(%handle, period_ms, "tokio interval spawned");
        handle
    }

    fn clear_interval(&self, handle: TimerHandle) {
        if let Some((_, task)) = self.tasks.remove(&handle) {
            task.abort();
            tracing::trace!(%handle, "tokio interval aborted");
        }
    }

    fn now(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
    }
}

impl std::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_on_period() {
        let scheduler = TokioScheduler::new(Handle::current());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let handle = scheduler.set_interval(
            100,
            Arc::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.now(), 350);

        scheduler.clear_interval(handle);
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.active_timers(), 0);
    }
}
