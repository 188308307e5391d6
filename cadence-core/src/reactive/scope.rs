//! Ownership scopes.
//!
//! A [`Scope`] is the lifecycle owner a host hands to the things it creates.
//! Each owned resource registers a teardown callback; when the scope ends,
//! either explicitly through [`Scope::dispose`] or by being dropped, the
//! callbacks run once, most recent first.

use parking_lot::Mutex;

type Cleanup = Box<dyn FnOnce() + Send>;

/// Owner of teardown callbacks.
///
/// # Example
///
/// ```rust,ignore
/// let scope = Scope::new();
/// let timer = IntervalTimer::new(clock, 100);
/// timer.bind_to(&scope);
///
/// drop(scope); // the timer's live handle is cleared here
/// ```
pub struct Scope {
    /// Pending callbacks; `None` once the scope has ended.
    cleanups: Mutex<Option<Vec<Cleanup>>>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self {
            cleanups: Mutex::new(Some(Vec::new())),
        }
    }

    /// Register a callback to run when the scope ends.
    ///
    /// Registering on an already disposed scope runs the callback at once.
    pub fn on_cleanup<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut cleanups = self.cleanups.lock();
        if let Some(pending) = cleanups.as_mut() {
            pending.push(Box::new(cleanup));
            return;
        }
        drop(cleanups);
        cleanup();
    }

    /// Run every registered callback. Later calls do nothing.
    pub fn dispose(&self) {
        let Some(cleanups) = self.cleanups.lock().take() else {
            return;
        };
        tracing::debug!(count = cleanups.len(), "disposing scope");
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }

    /// Whether the scope has ended.
    pub fn is_disposed(&self) -> bool {
        self.cleanups.lock().is_none()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("pending", &self.cleanups.lock().as_ref().map_or(0, Vec::len))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
