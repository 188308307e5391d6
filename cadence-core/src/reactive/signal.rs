//! Signal Implementation
//!
//! A Signal holds a value and tells its observers when that value changes.
//! Interval timers use one internally to publish their tick count, and a
//! `Signal<i64>` can drive a timer's duration.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (an effect), the
//!    signal registers that context's subscriber as an observer.
//!
//! 2. When a signal's value changes, every live observer is notified.
//!
//! 3. Observers are held weakly. Dropping the owner of a subscriber is
//!    enough to stop notifications; dead entries are pruned lazily.
//!
//! # Re-entrancy
//!
//! No lock is held while observers run. An observer may read the signal,
//! write it, or subscribe new observers from inside its callback.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type ObserverEntries = SmallVec<[(SubscriberId, Weak<Subscriber>); 2]>;

/// The set of observers attached to one observable value.
#[derive(Default)]
pub(crate) struct ObserverList {
    entries: Mutex<ObserverEntries>,
}

impl ObserverList {
    /// Register the current context's subscriber, if reads are tracked.
    pub(crate) fn track(&self) {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            self.add(&subscriber);
        }
    }

    pub(crate) fn add(&self, subscriber: &Arc<Subscriber>) {
        let mut entries = self.entries.lock();
        let id = subscriber.id();
        if entries.iter().any(|(existing, _)| *existing == id) {
            return;
        }
        entries.push((id, Arc::downgrade(subscriber)));
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.entries.lock().retain(|(existing, _)| *existing != id);
    }

    /// Notify every live observer, pruning the ones that were dropped.
    pub(crate) fn notify(&self) {
        let live: SmallVec<[Arc<Subscriber>; 4]> = {
            let mut entries = self.entries.lock();
            entries.retain(|(_, weak)| weak.strong_count() > 0);
            entries.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
        };
        for subscriber in live {
            subscriber.notify();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }
}

/// Handle returned by an explicit subscribe call.
///
/// Dropping it, or calling [`Subscription::cancel`], detaches the observer.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    subscriber: Option<Arc<Subscriber>>,
    observers: Weak<ObserverList>,
}

impl Subscription {
    pub(crate) fn attach(observers: &Arc<ObserverList>, subscriber: Subscriber) -> Self {
        let subscriber = Arc::new(subscriber);
        observers.add(&subscriber);
        Self {
            subscriber: Some(subscriber),
            observers: Arc::downgrade(observers),
        }
    }

    /// The ID of the underlying subscriber.
    pub fn id(&self) -> Option<SubscriberId> {
        self.subscriber.as_ref().map(|s| s.id())
    }

    /// Detach the observer now.
    pub fn cancel(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(subscriber) = self.subscriber.take() {
            if let Some(observers) = self.observers.upgrade() {
                observers.remove(subscriber.id());
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let period = Signal::new(250_i64);
/// let timer = IntervalTimer::new(clock, period.clone());
///
/// period.set(100); // picked up on the next read of the timer
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: u64,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Observers registered by tracked reads or explicit subscriptions.
    observers: Arc<ObserverList>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_signal_id(),
            value: Arc::new(RwLock::new(value)),
            observers: Arc::new(ObserverList::default()),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current observer.
    pub fn get(&self) -> T {
        self.observers.track();
        self.value.read().clone()
    }

    /// Get the current value without registering an observer.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Register the current observer without reading the value.
    pub fn track(&self) {
        self.observers.track();
    }

    /// Set a new value and notify observers.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.notify();
    }

    /// Update the value using a function, then notify observers.
    ///
    /// Returns the value that was stored.
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let stored = {
            let mut guard = self.value.write();
            let next = f(&guard);
            *guard = next.clone();
            next
        };
        self.notify();
        stored
    }

    /// Notify observers without changing the value.
    pub fn notify(&self) {
        self.observers.notify();
    }

    /// Register a notification callback.
    ///
    /// The callback runs on every change until the returned
    /// [`Subscription`] is dropped or cancelled.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        Subscription::attach(&self.observers, Subscriber::new(notify))
    }

    /// Get the number of live observers.
    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
