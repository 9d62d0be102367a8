//! Observers of a run and the registry that fans notifications out to them

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use super::RunState;

/// Receives fetched data, notices and fatal errors from a run
pub trait OutputListener: Send + Sync {
    /// Called with the full text of each fetched payload
    fn on_data(&self, data: &str);

    /// A recoverable problem, e.g. a failed request that will be retried
    fn on_notice(&self, _message: &str) {}

    /// The run is terminating because of this error
    fn on_error(&self, _message: &str) {}
}

/// Receives start and finish events of the background worker
pub trait ThreadListener: Send + Sync {
    fn on_start(&self) {}

    fn on_finish(&self, _state: RunState) {}
}

/// Ordered set of listeners shared between the automater and its worker
///
/// Notifications iterate a snapshot taken at call time, so listeners can be
/// added or removed concurrently with a run. A listener that panics is
/// logged and skipped; the rest still receive the notification.
pub struct ListenerRegistry<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<L>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove the first registration of `listener` (by `Arc` identity)
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match listeners
            .iter()
            .position(|l| std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)))
        {
            Some(idx) => {
                listeners.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Call `notify` on every listener in registration order
    ///
    /// Returns the number of listeners notified.
    pub fn for_each(&self, event: &str, notify: impl Fn(&L)) -> usize {
        let listeners = self.snapshot();
        for (idx, listener) in listeners.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| notify(listener.as_ref())));
            if outcome.is_err() {
                warn!(listener = idx, event, "Listener panicked, continuing with the rest");
            }
        }
        listeners.len()
    }
}

impl ListenerRegistry<dyn OutputListener> {
    pub fn notify_data(&self, data: &str) -> usize {
        self.for_each("data", |l| l.on_data(data))
    }

    pub fn notify_notice(&self, message: &str) -> usize {
        self.for_each("notice", |l| l.on_notice(message))
    }

    pub fn notify_error(&self, message: &str) -> usize {
        self.for_each("error", |l| l.on_error(message))
    }
}

impl ListenerRegistry<dyn ThreadListener> {
    pub fn notify_start(&self) -> usize {
        self.for_each("start", |l| l.on_start())
    }

    pub fn notify_finish(&self, state: RunState) -> usize {
        self.for_each("finish", |l| l.on_finish(state))
    }
}
