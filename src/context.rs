//! Per-instance runtime context.
//!
//! [`ModuleHandle`] is the one piece of shared mutable state for an
//! instance: the merged configuration, the render surface, hook lists,
//! download progress, the resource tracker and the functions the native
//! runtime publishes once it has loaded. The loading pipeline and the native
//! runtime talk to the loader exclusively through it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::banner::{streaming_compile_warning, Banner, BannerKind, OutputSink};
use crate::config::ResolvedConfig;
use crate::failure::{FailureClassifier, FailureReport, Route};
use crate::progress::{DownloadProgressMap, ProgressCallback};
use crate::startup::SystemInfo;
use crate::surface::RenderSurface;
use crate::tracker::{IntervalId, ResourceTracker, TeardownSummary};

/// Argument passed along with a message to a player object
#[derive(Debug, Clone, PartialEq)]
pub enum MessageValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for MessageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageValue::Text(text) => write!(f, "{}", text),
            MessageValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Functions the native runtime publishes once it has finished loading.
pub trait RuntimeExports: Send + Sync {
    fn send_message(&self, object: &str, method: &str, value: Option<&MessageValue>);
    fn set_fullscreen(&self, fullscreen: bool);
    /// Stop any camera / microphone capture the player started
    fn release_media_devices(&self) {}
}

/// Pre-run / post-run hook
pub type Hook = Box<dyn FnOnce() + Send>;

/// Startup state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    Created,
    CapabilityChecked,
    Loading,
    Resolved,
    Rejected,
}

impl StartupPhase {
    pub fn is_settled(self) -> bool {
        matches!(self, StartupPhase::Resolved | StartupPhase::Rejected)
    }
}

struct ModuleState {
    phase: StartupPhase,
    downloads: DownloadProgressMap,
    pre_run: Vec<Hook>,
    post_run: Vec<Hook>,
    exports: Option<Arc<dyn RuntimeExports>>,
}

struct Shared {
    id: Uuid,
    config: ResolvedConfig,
    system_info: SystemInfo,
    surface: Arc<dyn RenderSurface>,
    tracker: ResourceTracker,
    classifier: Arc<FailureClassifier>,
    output: Arc<dyn OutputSink>,
    banner: Banner,
    progress: Option<ProgressCallback>,
    should_quit: AtomicBool,
    state: Mutex<ModuleState>,
}

/// Everything needed to build a context
pub(crate) struct ModuleParts {
    pub config: ResolvedConfig,
    pub system_info: SystemInfo,
    pub surface: Arc<dyn RenderSurface>,
    pub tracker: ResourceTracker,
    pub classifier: Arc<FailureClassifier>,
    pub output: Arc<dyn OutputSink>,
    pub banner: Banner,
    pub progress: Option<ProgressCallback>,
}

/// Shared handle to one instance's runtime context.
#[derive(Clone)]
pub struct ModuleHandle {
    shared: Arc<Shared>,
}

/// Non-owning reference used by hooks the context itself stores
#[derive(Clone)]
pub(crate) struct WeakModule(Weak<Shared>);

impl WeakModule {
    pub fn upgrade(&self) -> Option<ModuleHandle> {
        self.0.upgrade().map(|shared| ModuleHandle { shared })
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("id", &self.shared.id)
            .field("phase", &self.startup_phase())
            .finish()
    }
}

impl ModuleHandle {
    pub(crate) fn new(parts: ModuleParts) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                config: parts.config,
                system_info: parts.system_info,
                surface: parts.surface,
                tracker: parts.tracker,
                classifier: parts.classifier,
                output: parts.output,
                banner: parts.banner,
                progress: parts.progress,
                should_quit: AtomicBool::new(false),
                state: Mutex::new(ModuleState {
                    phase: StartupPhase::Created,
                    downloads: DownloadProgressMap::new(),
                    pre_run: Vec::new(),
                    post_run: Vec::new(),
                    exports: None,
                }),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakModule {
        WeakModule(Arc::downgrade(&self.shared))
    }

    fn lock(&self) -> MutexGuard<'_, ModuleState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Unique id of this instance
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.shared.config
    }

    pub fn system_info(&self) -> SystemInfo {
        self.shared.system_info
    }

    pub fn surface(&self) -> &Arc<dyn RenderSurface> {
        &self.shared.surface
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.shared.tracker
    }

    pub(crate) fn classifier(&self) -> &Arc<FailureClassifier> {
        &self.shared.classifier
    }

    pub fn banner(&self) -> &Banner {
        &self.shared.banner
    }

    pub fn startup_phase(&self) -> StartupPhase {
        self.lock().phase
    }

    pub(crate) fn set_phase(&self, phase: StartupPhase) {
        let previous = std::mem::replace(&mut self.lock().phase, phase);
        debug!(instance = %self.id(), "Startup phase {:?} -> {:?}", previous, phase);
    }

    // --- output ---

    pub fn print(&self, message: &str) {
        self.shared.output.print(message);
    }

    /// Runtime error output. Streaming-compile fallbacks also raise a banner.
    pub fn print_err(&self, message: &str) {
        self.shared.output.print_err(message);
        if let Some(warning) = streaming_compile_warning(message, self.config().code_url.as_deref())
        {
            self.banner().show(&warning, BannerKind::Warning);
        }
    }

    // --- progress ---

    /// Forward a progress value to the caller's callback
    pub fn report_progress(&self, value: f32) {
        if let Some(progress) = &self.shared.progress {
            progress(value.clamp(0.0, 1.0));
        }
    }

    /// Record per-file download progress and report the aggregate.
    pub fn report_download(&self, id: &str, loaded: u64, total: Option<u64>, finished: bool) {
        let aggregate = {
            let mut state = self.lock();
            state.downloads.update(id, loaded, total, finished);
            state.downloads.aggregate()
        };
        self.report_progress(aggregate);
    }

    pub fn downloads(&self) -> DownloadProgressMap {
        self.lock().downloads.clone()
    }

    // --- hooks ---

    pub fn add_pre_run(&self, hook: impl FnOnce() + Send + 'static) {
        self.lock().pre_run.push(Box::new(hook));
    }

    pub fn add_post_run(&self, hook: impl FnOnce() + Send + 'static) {
        self.lock().post_run.push(Box::new(hook));
    }

    /// Called by the pipeline right before the runtime's main entry point.
    pub fn run_pre_run(&self) {
        let hooks = std::mem::take(&mut self.lock().pre_run);
        for hook in hooks {
            hook();
        }
    }

    /// Called by the pipeline once the runtime has finished initializing.
    pub fn run_post_run(&self) {
        let hooks = std::mem::take(&mut self.lock().post_run);
        debug!(instance = %self.id(), "Running {} post-run hooks", hooks.len());
        for hook in hooks {
            hook();
        }
    }

    // --- runtime exports ---

    /// Publish the runtime's callable functions.
    pub fn install_exports(&self, exports: Arc<dyn RuntimeExports>) {
        self.lock().exports = Some(exports);
    }

    pub fn exports(&self) -> Option<Arc<dyn RuntimeExports>> {
        self.lock().exports.clone()
    }

    pub(crate) fn take_exports(&self) -> Option<Arc<dyn RuntimeExports>> {
        self.lock().exports.take()
    }

    // --- faults ---

    /// Set the pattern identifying the runtime's own faults
    pub fn set_fault_pattern(&self, pattern: Regex) {
        self.shared.classifier.set_pattern(Some(pattern));
    }

    /// Report a fault detected by the loading pipeline itself.
    pub fn report_fault(&self, message: impl Into<String>) -> Route {
        self.shared.classifier.report(&FailureReport::new(message))
    }

    // --- resources ---

    pub fn register_interval<F>(&self, callback: F, period: Duration) -> IntervalId
    where
        F: FnMut() + Send + 'static,
    {
        self.shared.tracker.register_interval(callback, period)
    }

    pub fn clear_interval(&self, id: IntervalId) {
        self.shared.tracker.clear_interval(id);
    }

    pub fn register_deinitializer(&self, action: impl FnOnce() + Send + 'static) {
        self.shared.tracker.register_deinitializer(action);
    }

    // --- quit ---

    /// Whether the host asked the runtime to shut down
    pub fn should_quit(&self) -> bool {
        self.shared.should_quit.load(Ordering::SeqCst)
    }

    pub(crate) fn request_quit(&self) {
        if !self.shared.should_quit.swap(true, Ordering::SeqCst) {
            debug!(instance = %self.id(), "Quit requested");
        }
    }

    /// Called by the runtime once it has stopped: tears the instance down
    /// and completes any pending `quit()`.
    pub fn quit_cleanup(&self) -> TeardownSummary {
        let summary = self.shared.tracker.run_teardown();
        if summary.is_empty() {
            debug!(instance = %self.id(), "Quit cleanup found nothing left to release");
        }
        summary
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.tracker.is_torn_down()
    }
}
