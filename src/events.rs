//! Lifecycle notifications
//!
//! A minimal pub/sub surface: observers register for one kind of
//! notification and are called synchronously when it fires. A panicking
//! observer never disturbs the execution that emitted the notification.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::Error;

/// Kinds of lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Work is starting
    Execute,
    /// The armed timeout elapsed
    Timeout,
    /// The run faulted
    Error,
}

impl EventKind {
    /// Get the notification name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Execute => "execute",
            EventKind::Timeout => "timeout",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification as delivered to observers
#[derive(Debug, Clone, Copy)]
pub enum ExecutionEvent<'a> {
    Execute,
    Timeout,
    Error(&'a Error),
}

impl ExecutionEvent<'_> {
    /// The kind of this notification
    pub fn kind(&self) -> EventKind {
        match self {
            ExecutionEvent::Execute => EventKind::Execute,
            ExecutionEvent::Timeout => EventKind::Timeout,
            ExecutionEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Observer callback
pub type Listener = Arc<dyn Fn(&ExecutionEvent<'_>) + Send + Sync>;

/// Handle returned on registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

/// Registered observers of one execution
#[derive(Default)]
pub struct Listeners {
    registrations: Mutex<Vec<Registration>>,
}

impl Listeners {
    /// Create an empty observer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for one kind of notification
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ExecutionEvent<'_>) + Send + Sync + 'static,
    {
        self.on_shared(kind, Arc::new(listener))
    }

    /// Register an already shared observer
    pub fn on_shared(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.registrations.lock().push(Registration { id, kind, listener });
        id
    }

    /// Unregister an observer; returns false if it was not registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.lock();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Number of observers for a kind
    pub fn count(&self, kind: EventKind) -> usize {
        self.registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Deliver a notification to every matching observer
    ///
    /// Observers run outside the registry lock, so they may register or
    /// unregister observers themselves. Returns how many observers panicked.
    pub fn emit(&self, event: &ExecutionEvent<'_>) -> usize {
        let kind = event.kind();
        let targets: Vec<Listener> = self
            .registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.listener.clone())
            .collect();

        let mut panicked = 0;
        for listener in targets {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                panicked += 1;
                warn!(event = %kind, "Execution listener panicked; ignoring");
            }
        }
        panicked
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.registrations.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_matching_listeners_only() {
        let listeners = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        listeners.on(EventKind::Timeout, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        listeners.on(EventKind::Execute, |_| panic!("wrong kind"));

        assert_eq!(listeners.emit(&ExecutionEvent::Timeout), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_unregisters() {
        let listeners = Listeners::new();
        let id = listeners.on(EventKind::Execute, |_| {});
        assert_eq!(listeners.count(EventKind::Execute), 1);

        assert!(listeners.off(id));
        assert!(!listeners.off(id));
        assert_eq!(listeners.count(EventKind::Execute), 0);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let listeners = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));

        listeners.on(EventKind::Error, |_| panic!("observer bug"));
        let h = hits.clone();
        listeners.on(EventKind::Error, move |event| {
            if let ExecutionEvent::Error(err) = event {
                assert!(err.is_timeout());
            }
            h.fetch_add(1, Ordering::SeqCst);
        });

        let err = Error::timeout(10);
        assert_eq!(listeners.emit(&ExecutionEvent::Error(&err)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_unregister_itself() {
        let listeners = Arc::new(Listeners::new());
        let slot = Arc::new(Mutex::new(None::<ListenerId>));

        let inner = listeners.clone();
        let s = slot.clone();
        let id = listeners.on(EventKind::Timeout, move |_| {
            if let Some(id) = *s.lock() {
                inner.off(id);
            }
        });
        *slot.lock() = Some(id);

        listeners.emit(&ExecutionEvent::Timeout);
        assert_eq!(listeners.count(EventKind::Timeout), 0);
    }
}
