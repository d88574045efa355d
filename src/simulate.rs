//! Scripted loading pipeline and player used by the `simulate` command.
//!
//! Stands in for the asset downloader and the native runtime so the whole
//! lifecycle can be exercised headless: files "download" in chunks, an
//! optional fault is raised on the page, exports are published, and a main
//! loop interval watches for the quit request.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::context::{MessageValue, ModuleHandle, RuntimeExports};
use crate::failure::{FailureChannel, FailureEvent, PageFailureSource};
use crate::startup::AssetPipeline;
use crate::surface::MemorySurface;

/// Chunks each simulated file is delivered in
const CHUNKS_PER_FILE: u64 = 4;
/// Delay between chunks
const CHUNK_DELAY: Duration = Duration::from_millis(5);
/// Main loop period of the simulated player
pub const FRAME_PERIOD: Duration = Duration::from_millis(16);

/// A file the pipeline pretends to download
#[derive(Debug, Clone)]
pub struct SimulatedFile {
    pub id: String,
    pub size: u64,
}

impl SimulatedFile {
    pub fn new(id: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            size,
        }
    }
}

/// Player exports that log calls and drive fullscreen on the surface.
pub struct SimulatedPlayer {
    surface: Arc<MemorySurface>,
}

impl RuntimeExports for SimulatedPlayer {
    fn send_message(&self, object: &str, method: &str, value: Option<&MessageValue>) {
        match value {
            Some(value) => info!("📨 {}.{}({})", object, method, value),
            None => info!("📨 {}.{}()", object, method),
        }
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        info!("🖥️  Fullscreen {}", if fullscreen { "on" } else { "off" });
        self.surface.set_fullscreen_state(fullscreen);
    }

    fn release_media_devices(&self) {
        debug!("Released media devices");
    }
}

/// Pipeline that downloads nothing but behaves like one that does.
pub struct ScriptedPipeline {
    files: Vec<SimulatedFile>,
    fail_with: Option<String>,
    failure_source: Arc<PageFailureSource>,
    surface: Arc<MemorySurface>,
}

impl ScriptedPipeline {
    pub fn new(failure_source: Arc<PageFailureSource>, surface: Arc<MemorySurface>) -> Self {
        Self {
            files: vec![
                SimulatedFile::new("framework", 256 * 1024),
                SimulatedFile::new("code", 8 * 1024 * 1024),
                SimulatedFile::new("data", 24 * 1024 * 1024),
            ],
            fail_with: None,
            failure_source,
            surface,
        }
    }

    pub fn with_files(mut self, files: Vec<SimulatedFile>) -> Self {
        self.files = files;
        self
    }

    /// Raise this message as an unhandled rejection once downloads finish.
    pub fn with_failure(mut self, message: Option<String>) -> Self {
        self.fail_with = message;
        self
    }

    async fn run(
        files: Vec<SimulatedFile>,
        fail_with: Option<String>,
        failure_source: Arc<PageFailureSource>,
        player: Arc<SimulatedPlayer>,
        module: ModuleHandle,
    ) {
        for file in &files {
            let chunk = (file.size / CHUNKS_PER_FILE).max(1);
            let mut loaded = 0;
            while loaded < file.size {
                sleep(CHUNK_DELAY).await;
                loaded = (loaded + chunk).min(file.size);
                module.report_download(&file.id, loaded, Some(file.size), loaded == file.size);
            }
            debug!("Downloaded {} ({} bytes)", file.id, file.size);
        }

        if let Some(message) = fail_with {
            let stack = format!("{}\n    at wasm-function[1234]:0x5f2a1", message);
            failure_source.emit(
                FailureChannel::UnhandledRejection,
                &FailureEvent::with_cause(message, stack),
            );
            return;
        }

        module.run_pre_run();
        module.install_exports(player);

        let main_loop = module.downgrade();
        module.register_interval(
            move || {
                if let Some(module) = main_loop.upgrade() {
                    if module.should_quit() {
                        module.quit_cleanup();
                    }
                }
            },
            FRAME_PERIOD,
        );

        module.run_post_run();
    }
}

impl AssetPipeline for ScriptedPipeline {
    fn start(&self, module: ModuleHandle) {
        let player = Arc::new(SimulatedPlayer {
            surface: self.surface.clone(),
        });
        tokio::spawn(Self::run(
            self.files.clone(),
            self.fail_with.clone(),
            self.failure_source.clone(),
            player,
            module,
        ));
    }
}
