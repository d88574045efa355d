//! Error taxonomy for the loader.
//!
//! Only capability failures and classified runtime faults ever leave the
//! library as errors. Expected local conditions (missing config keys, unknown
//! interval ids, calls before the player has loaded) are handled inline with
//! logging or defaulting.

use std::path::PathBuf;

use thiserror::Error;

/// Host capability required by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// WebGL graphics API
    GraphicsApi,
    /// WebAssembly byte-code execution
    ByteCodeExec,
}

/// Errors from resolving or loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid URL \"{url}\": {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Why the startup operation was rejected.
///
/// `Display` renders the human-readable cause string handed to the caller.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The host lacks a required capability. Never retried.
    #[error("{}", unsupported_message(.0))]
    Unsupported(Capability),
    /// A classified runtime fault arrived while loading.
    #[error("{0}")]
    RuntimeFault(String),
    /// The caller's configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Every path able to settle startup was dropped.
    #[error("Startup was abandoned before the player signalled readiness")]
    Abandoned,
}

fn unsupported_message(capability: &Capability) -> &'static str {
    match capability {
        Capability::GraphicsApi => "Your browser does not support WebGL.",
        Capability::ByteCodeExec => "Your browser does not support WebAssembly.",
    }
}

impl StartupError {
    /// True for failures caused by the host environment rather than the content.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, StartupError::Unsupported(_))
    }
}
