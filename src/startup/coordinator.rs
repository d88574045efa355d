//! Startup handshake for a player instance.
//!
//! ```text
//! Created ──capabilities ok──▶ CapabilityChecked ──pipeline started──▶ Loading
//!    │                                                                  │    │
//!    └──────────── unsupported ───────────▶ Rejected ◀── fault ─────────┘    │
//!                                                                            ▼
//!                                                    Resolved ◀── post-run hook
//! ```
//!
//! The result travels through a single oneshot channel, so startup settles
//! at most once. Signals that arrive after settlement are ignored.

use std::sync::{Arc, Mutex};

use regex::Regex;
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use url::Url;

use crate::banner::{Banner, BannerCallback, OutputSink, TracingSink};
use crate::config::{self, LoaderConfig};
use crate::context::{ModuleHandle, ModuleParts, StartupPhase};
use crate::error::StartupError;
use crate::failure::{
    FailureClassifier, FailureHandler, FailureReport, FailureSource, LogNotifier, Notifier,
};
use crate::handle::RuntimeHandle;
use crate::progress::ProgressCallback;
use crate::surface::{FullscreenSizeKeeper, RenderSurface};
use crate::tracker::ResourceTracker;

use super::capability::{check_capabilities, SystemInfo};

/// The external pipeline that downloads assets and boots the native runtime.
///
/// `start` must not block. The pipeline signals readiness by calling
/// [`ModuleHandle::run_post_run`] and reports faults with
/// [`ModuleHandle::report_fault`] (or by letting them surface on the
/// page's failure source).
pub trait AssetPipeline: Send + Sync {
    fn start(&self, module: ModuleHandle);
}

/// Host facilities an instance depends on.
#[derive(Clone)]
pub struct Environment {
    /// Location of the hosting page; relative asset URLs resolve against it
    pub page_url: Url,
    pub system_info: SystemInfo,
    pub failure_source: Arc<dyn FailureSource>,
    pub pipeline: Arc<dyn AssetPipeline>,
    /// Recognizes runtime-internal faults among page failures
    pub fault_pattern: Option<Regex>,
    pub notifier: Arc<dyn Notifier>,
    pub output: Arc<dyn OutputSink>,
}

impl Environment {
    pub fn new(
        page_url: Url,
        system_info: SystemInfo,
        failure_source: Arc<dyn FailureSource>,
        pipeline: Arc<dyn AssetPipeline>,
    ) -> Self {
        Self {
            page_url,
            system_info,
            failure_source,
            pipeline,
            fault_pattern: None,
            notifier: Arc::new(LogNotifier),
            output: Arc::new(TracingSink),
        }
    }

    pub fn with_fault_pattern(mut self, pattern: Regex) -> Self {
        self.fault_pattern = Some(pattern);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = output;
        self
    }
}

/// Optional caller callbacks.
#[derive(Clone, Default)]
pub struct InstanceOptions {
    pub on_progress: Option<ProgressCallback>,
    pub show_banner: Option<BannerCallback>,
    /// Receives runtime faults once startup has resolved
    pub error_handler: Option<FailureHandler>,
    /// Called after the instance has been torn down
    pub on_quit: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl InstanceOptions {
    pub fn on_progress(mut self, callback: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn show_banner(mut self, callback: BannerCallback) -> Self {
        self.show_banner = Some(callback);
        self
    }

    pub fn error_handler(
        mut self,
        handler: impl Fn(&FailureReport) + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn on_quit(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_quit = Some(Arc::new(callback));
        self
    }
}

type StartupResult = Result<RuntimeHandle, StartupError>;

/// Take-once slot for the startup result.
#[derive(Clone)]
struct Settlement {
    sender: Arc<Mutex<Option<oneshot::Sender<StartupResult>>>>,
}

impl Settlement {
    fn new() -> (Self, oneshot::Receiver<StartupResult>) {
        let (tx, rx) = oneshot::channel();
        let settlement = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (settlement, rx)
    }

    fn is_settled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Deliver the result. Returns false if startup had already settled.
    fn settle(&self, module: &ModuleHandle, result: StartupResult) -> bool {
        let Some(sender) = self.sender.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            debug!(instance = %module.id(), "Startup already settled, ignoring signal");
            return false;
        };

        module.set_phase(if result.is_ok() {
            StartupPhase::Resolved
        } else {
            StartupPhase::Rejected
        });
        if sender.send(result).is_err() {
            debug!(instance = %module.id(), "Startup result dropped by caller");
        }
        true
    }
}

/// Build the runtime context and establish every page-level side effect,
/// registering a deinitializer for each.
fn establish(
    surface: Arc<dyn RenderSurface>,
    resolved: config::ResolvedConfig,
    env: &Environment,
    options: InstanceOptions,
) -> ModuleHandle {
    let classifier = Arc::new(FailureClassifier::new(
        env.fault_pattern.clone(),
        options.error_handler,
        env.notifier.clone(),
    ));

    let tracker = match options.on_quit {
        Some(on_quit) => ResourceTracker::with_on_quit(move || on_quit()),
        None => ResourceTracker::new(),
    };

    let module = ModuleHandle::new(ModuleParts {
        config: resolved,
        system_info: env.system_info,
        surface: surface.clone(),
        tracker,
        classifier: classifier.clone(),
        output: env.output.clone(),
        banner: Banner::new(options.show_banner),
        progress: options.on_progress,
    });

    let weak = module.downgrade();
    module.register_deinitializer(move || {
        if let Some(module) = weak.upgrade() {
            if let Some(exports) = module.take_exports() {
                exports.release_media_devices();
            }
        }
    });

    let disabled_events = module.config().disabled_canvas_events.clone();
    for event in &disabled_events {
        surface.suppress_event(event);
    }
    let events_surface = surface.clone();
    module.register_deinitializer(move || {
        for event in &disabled_events {
            events_surface.restore_event(event);
        }
    });

    let listener_ids = classifier.install(env.failure_source.as_ref());
    let failure_source = env.failure_source.clone();
    module.register_deinitializer(move || {
        for id in listener_ids {
            failure_source.unsubscribe(id);
        }
    });

    let keeper = Arc::new(FullscreenSizeKeeper::new());
    let watched = Arc::downgrade(&surface);
    let watch_id = surface.watch_fullscreen(Arc::new(move |fullscreen| {
        if let Some(surface) = watched.upgrade() {
            keeper.on_fullscreen_change(surface.as_ref(), fullscreen);
        }
    }));
    module.register_deinitializer(move || surface.unwatch_fullscreen(watch_id));

    module
}

/// Reject startup and release everything established for it.
fn reject(module: &ModuleHandle, settlement: &Settlement, err: StartupError) {
    module.classifier().clear_startup_handler();
    let cause = err.to_string();
    if settlement.settle(module, Err(err)) {
        error!(instance = %module.id(), "Startup failed: {}", cause);
        module.quit_cleanup();
    }
}

fn begin_loading(module: &ModuleHandle, settlement: &Settlement, pipeline: &dyn AssetPipeline) {
    let weak = module.downgrade();
    let on_fault = settlement.clone();
    module
        .classifier()
        .set_startup_handler(Arc::new(move |report: &FailureReport| {
            if let Some(module) = weak.upgrade() {
                reject(
                    &module,
                    &on_fault,
                    StartupError::RuntimeFault(report.message.clone()),
                );
            }
        }));

    module.report_progress(0.0);

    let weak = module.downgrade();
    let on_ready = settlement.clone();
    module.add_post_run(move || {
        let Some(module) = weak.upgrade() else {
            return;
        };
        if on_ready.is_settled() {
            debug!(instance = %module.id(), "Post-run after startup settled, ignoring");
            return;
        }
        module.report_progress(1.0);
        module.classifier().clear_startup_handler();
        if on_ready.settle(&module, Ok(RuntimeHandle::new(module.clone()))) {
            info!(instance = %module.id(), "✅ {} is ready", module.config().product_name);
        }
    });

    module.set_phase(StartupPhase::Loading);
    pipeline.start(module.clone());
}

/// Create a player instance on `surface`.
///
/// Resolves once the runtime signals readiness, or rejects with the cause.
/// There is no timeout: if the pipeline never signals, this stays pending.
pub async fn create_instance(
    surface: Arc<dyn RenderSurface>,
    config: &LoaderConfig,
    env: Environment,
    options: InstanceOptions,
) -> Result<RuntimeHandle, StartupError> {
    let resolved = config::resolve(config, &env.page_url)?;
    let module = establish(surface, resolved, &env, options);
    info!(
        instance = %module.id(),
        "Starting {} {} by {}",
        module.config().product_name,
        module.config().product_version,
        module.config().company_name
    );

    let (settlement, result) = Settlement::new();

    if let Err(err) = check_capabilities(&module.system_info(), env.output.as_ref()) {
        reject(&module, &settlement, err);
    } else {
        module.set_phase(StartupPhase::CapabilityChecked);
        begin_loading(&module, &settlement, env.pipeline.as_ref());
    }

    result.await.unwrap_or(Err(StartupError::Abandoned))
}
