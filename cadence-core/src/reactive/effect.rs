//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever
//! something it read notifies.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately inside its own
//!    reactive context, so every tracked read registers the effect.
//!
//! 2. When an observed value notifies (a timer ticks, a signal is set),
//!    the effect runs again and re-registers whatever it reads this time.
//!
//! 3. Dropping or disposing the effect stops further runs.
//!
//! Effects are how a host observes a timer: an effect that reads
//! `tick_count()` re-runs once per counted tick.
//!
//! # Re-entrancy
//!
//! A notification that arrives while the effect is already running does
//! not recurse. It is recorded and the effect runs once more after the
//! current run returns.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// A side-effecting computation that runs when its observed values change.
///
/// # Example
///
/// ```rust,ignore
/// let timer = IntervalTimer::new(clock, 100);
///
/// let effect = Effect::new(move || {
///     println!("ticks: {}", timer.tick_count().unwrap_or(0));
/// });
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    run: Box<dyn Fn() + Send + Sync>,
    subscriber: Arc<Subscriber>,
    disposed: AtomicBool,
    running: AtomicBool,
    pending: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            self.pending.store(true, Ordering::SeqCst);
            return;
        }

        loop {
            self.pending.store(false, Ordering::SeqCst);
            {
                let _ctx = ReactiveContext::enter(self.subscriber.clone());
                (self.run)();
            }
            self.run_count.fetch_add(1, Ordering::SeqCst);

            if !self.pending.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }
}

impl Effect {
    /// Create a new effect and run it once to establish its observations.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it.
    ///
    /// It observes nothing until [`Effect::execute`] is called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<EffectInner>| {
            let weak = weak.clone();
            EffectInner {
                run: Box::new(run),
                subscriber: Arc::new(Subscriber::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.execute();
                    }
                })),
                disposed: AtomicBool::new(false),
                running: AtomicBool::new(false),
                pending: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }
        });
        Self { inner }
    }

    /// Get the subscriber ID used for observation.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber.id()
    }

    /// Run the effect function now, tracking what it reads.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect. It will not run again.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.subscriber_id())
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
