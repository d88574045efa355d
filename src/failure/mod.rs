//! Interception and classification of runtime failures.
//!
//! The classifier listens on the page's global failure channels for the
//! lifetime of an instance. Every failure is normalized into a
//! [`FailureReport`]; only those matching the runtime's fault pattern are
//! treated as player faults and routed:
//!
//! 1. benign fullscreen errors are dropped,
//! 2. while starting up, the startup handler receives it (rejecting startup),
//! 3. afterwards the caller's error handler receives it,
//! 4. otherwise it is logged and, once per instance, shown to the user.

pub mod remediation;
pub mod source;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use regex::Regex;
use tracing::{debug, error, info};

pub use remediation::{remediation_text, signature_of, FailureSignature};
pub use source::{
    FailureCause, FailureChannel, FailureEvent, FailureListener, FailureSource, ListenerId,
    PageFailureSource,
};

/// Messages containing this come from fullscreen transitions and are never reported
const FULLSCREEN_ERROR: &str = "fullscreen error";

/// A normalized failure: message (with stack appended) and where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub message: String,
    pub filename: String,
    pub lineno: u32,
}

impl FailureReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            filename: String::new(),
            lineno: 0,
        }
    }
}

pub type FailureHandler = Arc<dyn Fn(&FailureReport) + Send + Sync>;

/// Blocking end-user notification (`alert` in a browser).
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        error!("{}", message);
    }
}

/// Where a forwarded failure ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Benign fullscreen noise
    Dropped,
    StartupHandler,
    ErrorHandler,
    /// Logged; `notified` is true if this call showed the one-time alert
    Fallback { notified: bool },
}

/// Outcome of handling a page failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not a player fault; left to the page's own handlers
    Ignored,
    Routed(Route),
}

/// Normalize a failure event into message, stack and location.
pub fn normalize(event: &FailureEvent) -> FailureReport {
    let cause = event.cause.as_ref();

    let message = cause
        .and_then(|c| c.text.clone().or_else(|| c.message.clone()))
        .or_else(|| event.message.clone())
        .unwrap_or_default();

    let stack = cause.and_then(|c| c.stack.as_deref()).unwrap_or("");
    let stack = stack.strip_prefix(message.as_str()).unwrap_or(stack).trim();

    let filename = event
        .filename
        .clone()
        .filter(|f| !f.is_empty())
        .or_else(|| cause.and_then(|c| c.file_name.clone()))
        .unwrap_or_default();
    let lineno = event
        .lineno
        .filter(|l| *l != 0)
        .or_else(|| cause.and_then(|c| c.line_number))
        .unwrap_or(0);

    FailureReport {
        message: format!("{}\n{}", message, stack),
        filename,
        lineno,
    }
}

/// Classifies page failures and routes player faults for one instance.
pub struct FailureClassifier {
    pattern: RwLock<Option<Regex>>,
    startup_handler: Mutex<Option<FailureHandler>>,
    error_handler: Option<FailureHandler>,
    notifier: Arc<dyn Notifier>,
    did_show_error: AtomicBool,
}

impl FailureClassifier {
    pub fn new(
        pattern: Option<Regex>,
        error_handler: Option<FailureHandler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pattern: RwLock::new(pattern),
            startup_handler: Mutex::new(None),
            error_handler,
            notifier,
            did_show_error: AtomicBool::new(false),
        }
    }

    /// Replace the pattern recognizing runtime-internal faults
    pub fn set_pattern(&self, pattern: Option<Regex>) {
        *self.pattern.write().unwrap_or_else(|e| e.into_inner()) = pattern;
    }

    pub fn set_startup_handler(&self, handler: FailureHandler) {
        *self.startup_handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    pub fn clear_startup_handler(&self) {
        self.startup_handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    pub fn has_startup_handler(&self) -> bool {
        self.startup_handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn has_shown_error(&self) -> bool {
        self.did_show_error.load(Ordering::SeqCst)
    }

    fn is_runtime_fault(&self, message: &str) -> bool {
        self.pattern
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(message))
    }

    /// Handle a failure observed on the page.
    pub fn handle_event(&self, event: &FailureEvent) -> Disposition {
        let report = normalize(event);
        if !self.is_runtime_fault(&report.message) {
            debug!("Ignoring page failure that is not a player fault");
            return Disposition::Ignored;
        }
        Disposition::Routed(self.report(&report))
    }

    /// Route a player fault. Explicit faults from the loading pipeline enter here directly.
    pub fn report(&self, report: &FailureReport) -> Route {
        if report.message.contains(FULLSCREEN_ERROR) {
            debug!("Dropping fullscreen error");
            return Route::Dropped;
        }

        let startup_handler = self
            .startup_handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(handler) = startup_handler {
            handler(report);
            return Route::StartupHandler;
        }

        if let Some(handler) = &self.error_handler {
            handler(report);
            return Route::ErrorHandler;
        }

        info!("Invoking error handler due to\n{}", report.message);
        if self.did_show_error.swap(true, Ordering::SeqCst) {
            return Route::Fallback { notified: false };
        }
        self.notifier.alert(&remediation_text(&report.message));
        Route::Fallback { notified: true }
    }

    /// Subscribe to both global failure channels. Returns the listener ids
    /// to unsubscribe on teardown.
    pub fn install(self: &Arc<Self>, source: &dyn FailureSource) -> Vec<ListenerId> {
        [FailureChannel::Error, FailureChannel::UnhandledRejection]
            .into_iter()
            .map(|channel| {
                let classifier = Arc::downgrade(self);
                let listener: FailureListener = Arc::new(move |event: &FailureEvent| {
                    let Some(classifier) = classifier.upgrade() else {
                        return;
                    };
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| classifier.handle_event(event)));
                    if outcome.is_err() {
                        error!("Failure handler panicked while handling a {:?} event", channel);
                    }
                });
                source.subscribe(channel, listener)
            })
            .collect()
    }
}
