//! Print sinks and the caller's banner.
//!
//! The native runtime writes through `print`/`print_err`; loader-level
//! warnings surface through [`Banner`], which prefers the caller's banner
//! callback until an error banner has been shown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

/// Marker the runtime prints when streaming compilation falls back
const STREAMING_COMPILE_FAILED: &str = "wasm streaming compile failed";

/// Destination for the runtime's standard output and error streams.
pub trait OutputSink: Send + Sync {
    fn print(&self, message: &str);
    fn print_err(&self, message: &str);
}

/// Default sink writing through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn print(&self, message: &str) {
        info!(target: "player", "{}", message);
    }

    fn print_err(&self, message: &str) {
        error!(target: "player", "{}", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Error,
    Warning,
    Info,
}

/// Caller-supplied banner callback
pub type BannerCallback = Arc<dyn Fn(&str, BannerKind) + Send + Sync>;

/// Routes loader notices to the caller's banner, or to the log.
pub struct Banner {
    callback: Option<BannerCallback>,
    aborted: AtomicBool,
}

impl Banner {
    pub fn new(callback: Option<BannerCallback>) -> Self {
        Self {
            callback,
            aborted: AtomicBool::new(false),
        }
    }

    /// Show a notice. Once an error banner was delivered, everything after
    /// it goes to the log instead.
    pub fn show(&self, message: &str, kind: BannerKind) {
        if let Some(callback) = &self.callback {
            if !self.aborted.load(Ordering::SeqCst) {
                if kind == BannerKind::Error {
                    self.aborted.store(true, Ordering::SeqCst);
                }
                callback(message, kind);
                return;
            }
        }

        match kind {
            BannerKind::Error => error!("{}", message),
            BannerKind::Warning => warn!("{}", message),
            BannerKind::Info => info!("{}", message),
        }
    }
}

/// Diagnose a runtime error line, returning the warning to show if it
/// reports a failed streaming compile.
pub fn streaming_compile_warning(message: &str, code_url: Option<&str>) -> Option<String> {
    if !message.contains(STREAMING_COMPILE_FAILED) {
        return None;
    }

    let code_url = code_url.unwrap_or("<codeUrl>");
    let warning = if message.to_lowercase().contains("mime") {
        format!(
            "HTTP Response Header \"Content-Type\" configured incorrectly on the server for file {}, \
             should be \"application/wasm\". Startup time performance will suffer.",
            code_url
        )
    } else {
        format!(
            "WebAssembly streaming compilation failed! This can happen for example if \
             \"Content-Encoding\" HTTP header is incorrectly enabled on the server for file {}, \
             but the file is not pre-compressed on disk (or vice versa). Check the Network tab \
             in browser Devtools to debug server header configuration.",
            code_url
        )
    };
    Some(warning)
}
