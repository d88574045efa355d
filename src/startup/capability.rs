//! Host capability probe and the precondition check run before loading.

use serde::{Deserialize, Serialize};

use crate::banner::OutputSink;
use crate::error::{Capability, StartupError};

/// Graphics API level reported by the capability probe (`0`, `1` or `2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum GraphicsApi {
    None,
    /// WebGL 1 only; the player runs with reduced features
    Legacy,
    Modern,
}

impl From<u8> for GraphicsApi {
    fn from(level: u8) -> Self {
        match level {
            0 => GraphicsApi::None,
            1 => GraphicsApi::Legacy,
            _ => GraphicsApi::Modern,
        }
    }
}

impl From<GraphicsApi> for u8 {
    fn from(api: GraphicsApi) -> Self {
        match api {
            GraphicsApi::None => 0,
            GraphicsApi::Legacy => 1,
            GraphicsApi::Modern => 2,
        }
    }
}

/// What the host environment supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub has_graphics_api: GraphicsApi,
    pub has_byte_code_exec: bool,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            has_graphics_api: GraphicsApi::Modern,
            has_byte_code_exec: true,
        }
    }
}

pub(crate) const LEGACY_GRAPHICS_WARNING: &str =
    "Warning: Your browser does not support \"WebGL 2\" Graphics API, switching to \"WebGL 1\"";

/// Verify the host can run the player at all.
///
/// A legacy graphics API is accepted with a warning through `output`.
pub fn check_capabilities(info: &SystemInfo, output: &dyn OutputSink) -> Result<(), StartupError> {
    if info.has_graphics_api == GraphicsApi::None {
        return Err(StartupError::Unsupported(Capability::GraphicsApi));
    }
    if !info.has_byte_code_exec {
        return Err(StartupError::Unsupported(Capability::ByteCodeExec));
    }
    if info.has_graphics_api == GraphicsApi::Legacy {
        output.print(LEGACY_GRAPHICS_WARNING);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl OutputSink for Lines {
        fn print(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
        fn print_err(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_graphics_api_levels() {
        assert_eq!(GraphicsApi::from(0), GraphicsApi::None);
        assert_eq!(GraphicsApi::from(1), GraphicsApi::Legacy);
        assert_eq!(GraphicsApi::from(2), GraphicsApi::Modern);

        let info: SystemInfo =
            serde_json::from_str(r#"{"hasGraphicsApi": 1, "hasByteCodeExec": true}"#).unwrap();
        assert_eq!(info.has_graphics_api, GraphicsApi::Legacy);
    }

    #[test]
    fn test_missing_capabilities_fail() {
        let lines = Lines::default();
        let no_gl = SystemInfo {
            has_graphics_api: GraphicsApi::None,
            has_byte_code_exec: true,
        };
        let err = check_capabilities(&no_gl, &lines).unwrap_err();
        assert_eq!(err.to_string(), "Your browser does not support WebGL.");

        let no_wasm = SystemInfo {
            has_graphics_api: GraphicsApi::Modern,
            has_byte_code_exec: false,
        };
        let err = check_capabilities(&no_wasm, &lines).unwrap_err();
        assert_eq!(err.to_string(), "Your browser does not support WebAssembly.");
        assert!(lines.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_legacy_graphics_warns() {
        let lines = Lines::default();
        let info = SystemInfo {
            has_graphics_api: GraphicsApi::Legacy,
            has_byte_code_exec: true,
        };
        check_capabilities(&info, &lines).unwrap();
        assert_eq!(*lines.0.lock().unwrap(), vec![LEGACY_GRAPHICS_WARNING.to_string()]);

        let lines = Lines::default();
        check_capabilities(&SystemInfo::default(), &lines).unwrap();
        assert!(lines.0.lock().unwrap().is_empty());
    }
}
