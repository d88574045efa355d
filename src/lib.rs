//! Bootstrap and lifecycle supervision for an embedded WebGL player.
//!
//! [`create_instance`] merges the caller's configuration with defaults,
//! sets up the render surface and failure interception, starts the external
//! loading pipeline and resolves to a [`RuntimeHandle`] once the player is
//! ready. Everything the instance establishes on the page is tracked and
//! released exactly once when the player quits.
//!
//! ## Usage
//!
//! ```ignore
//! let env = Environment::new(page_url, system_info, failure_source, pipeline)
//!     .with_fault_pattern(Regex::new(r"wasm-function\[")?);
//! let options = InstanceOptions::default().on_progress(|p| println!("{:.0}%", p * 100.0));
//!
//! let player = create_instance(surface, &config, env, options).await?;
//! player.send_message("GameManager", "StartLevel", Some(MessageValue::Number(1.0)));
//! player.quit().await;
//! ```

pub mod banner;
pub mod config;
pub mod context;
pub mod error;
pub mod failure;
pub mod handle;
pub mod progress;
pub mod simulate;
pub mod startup;
pub mod surface;
pub mod tracker;

pub use banner::{Banner, BannerCallback, BannerKind, OutputSink, TracingSink};
pub use config::{LoaderConfig, ResolvedConfig};
pub use context::{MessageValue, ModuleHandle, RuntimeExports, StartupPhase};
pub use error::{Capability, ConfigError, StartupError};
pub use failure::{
    FailureChannel, FailureEvent, FailureReport, FailureSource, LogNotifier, Notifier,
    PageFailureSource,
};
pub use handle::RuntimeHandle;
pub use startup::{
    create_instance, AssetPipeline, Environment, GraphicsApi, InstanceOptions, SystemInfo,
};
pub use surface::{InlineSize, MemorySurface, RenderSurface};
pub use tracker::{IntervalId, ResourceTracker};
