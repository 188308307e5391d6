//! Reactive Context
//!
//! The reactive context tracks which observer is currently running so that
//! reads of observable values (a timer's tick count, a signal-backed
//! duration) can register that observer automatically.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering a context pushes the observer,
//! dropping the returned guard pops it. [`ReactiveContext::untracked`]
//! pushes an empty frame, which hides every outer observer until it ends.
//! Nested contexts are supported: an effect that triggers another effect
//! while running keeps its own frame.

use std::cell::RefCell;
use std::sync::Arc;

use smallvec::SmallVec;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<SmallVec<[Frame; 4]>> = RefCell::new(SmallVec::new());
}

/// One entry of the context stack. `None` marks an untracked section.
struct Frame {
    subscriber: Option<Arc<Subscriber>>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the observer panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While the guard lives, every tracked read on this thread registers
    /// `subscriber` as an observer.
    pub fn enter(subscriber: Arc<Subscriber>) -> Self {
        let subscriber_id = Some(subscriber.id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber: Some(subscriber),
            });
        });
        Self { subscriber_id }
    }

    /// Run `f` with dependency tracking suspended.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Frame { subscriber: None }));
        let _guard = Self { subscriber_id: None };
        f()
    }

    /// Check if reads on this thread are currently tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map_or(false, |frame| frame.subscriber.is_some())
        })
    }

    /// The observer of the innermost tracked context, if any.
    pub fn current_subscriber() -> Option<Arc<Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.subscriber.clone())
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.subscriber.as_ref().map(|s| s.id()),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber() -> Arc<Subscriber> {
        Arc::new(Subscriber::new(|| {}))
    }

    #[test]
    fn context_tracks_subscriber() {
        let sub = subscriber();
        let id = sub.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(sub);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn nested_contexts() {
        let outer = subscriber();
        let inner = subscriber();
        let (outer_id, inner_id) = (outer.id(), inner.id());

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(outer_id));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(inner_id));
            }

            assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(outer_id));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_hides_outer_subscriber() {
        let _ctx = ReactiveContext::enter(subscriber());

        let seen = ReactiveContext::untracked(|| ReactiveContext::is_active());
        assert!(!seen);
        assert!(ReactiveContext::is_active());
    }
}
