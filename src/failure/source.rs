//! Failure sources the classifier subscribes to.
//!
//! In a browser this is the window's `error` and `unhandledrejection`
//! events; headless hosts publish structured faults through
//! [`PageFailureSource`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which global channel a failure arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureChannel {
    /// Synchronous uncaught error
    Error,
    /// Unhandled asynchronous rejection
    UnhandledRejection,
}

/// The object behind a failure event (`event.reason` / `event.error`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureCause {
    /// String form of the cause, e.g. `RuntimeError: unreachable`
    pub text: Option<String>,
    /// The cause's own `message` field
    pub message: Option<String>,
    pub stack: Option<String>,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
}

/// A failure observed on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureEvent {
    pub cause: Option<FailureCause>,
    /// The event's own message
    pub message: Option<String>,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
}

impl FailureEvent {
    /// Event carrying only a message, as plain `error` events do
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Event wrapping an error object with a stack
    pub fn with_cause(text: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            cause: Some(FailureCause {
                text: Some(text.into()),
                stack: Some(stack.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

pub type FailureListener = Arc<dyn Fn(&FailureEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A place failures can be observed.
pub trait FailureSource: Send + Sync {
    fn subscribe(&self, channel: FailureChannel, listener: FailureListener) -> ListenerId;
    fn unsubscribe(&self, id: ListenerId);
}

#[derive(Default)]
struct Listeners {
    next: u64,
    by_id: HashMap<ListenerId, (FailureChannel, FailureListener)>,
}

/// Process-local failure channel shared by everything on one page.
#[derive(Default)]
pub struct PageFailureSource {
    listeners: Mutex<Listeners>,
}

impl PageFailureSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver a failure to every listener on `channel`.
    ///
    /// Listeners may subscribe or unsubscribe while being notified.
    pub fn emit(&self, channel: FailureChannel, event: &FailureEvent) -> usize {
        let targets: Vec<FailureListener> = self
            .lock()
            .by_id
            .values()
            .filter(|(c, _)| *c == channel)
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in &targets {
            listener(event);
        }
        targets.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().by_id.len()
    }
}

impl FailureSource for PageFailureSource {
    fn subscribe(&self, channel: FailureChannel, listener: FailureListener) -> ListenerId {
        let mut listeners = self.lock();
        listeners.next += 1;
        let id = ListenerId(listeners.next);
        listeners.by_id.insert(id, (channel, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.lock().by_id.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_only_reaches_matching_channel() {
        let source = PageFailureSource::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let e = errors.clone();
        source.subscribe(
            FailureChannel::Error,
            Arc::new(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(source.emit(FailureChannel::UnhandledRejection, &FailureEvent::default()), 0);
        assert_eq!(source.emit(FailureChannel::Error, &FailureEvent::message("boom")), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_from_inside_listener() {
        let source = Arc::new(PageFailureSource::new());
        let id_slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let s = source.clone();
        let slot = id_slot.clone();
        let id = source.subscribe(
            FailureChannel::Error,
            Arc::new(move |_| {
                if let Some(id) = *slot.lock().unwrap() {
                    s.unsubscribe(id);
                }
            }),
        );
        *id_slot.lock().unwrap() = Some(id);

        source.emit(FailureChannel::Error, &FailureEvent::message("once"));
        assert_eq!(source.listener_count(), 0);
    }
}
