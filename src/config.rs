//! Loader configuration and its resolution against built-in defaults.
//!
//! The caller hands over a [`LoaderConfig`] once. Resolution never touches
//! the caller's value: it clones it, fills in documented defaults (warning
//! once per missing required option) and produces a [`ResolvedConfig`] that
//! the rest of the instance reads from.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::ConfigError;

/// Default company name
pub const DEFAULT_COMPANY_NAME: &str = "Unity";
/// Default product name
pub const DEFAULT_PRODUCT_NAME: &str = "WebGL Player";
/// Default product version
pub const DEFAULT_PRODUCT_VERSION: &str = "1.0";
/// Default streaming assets location, relative to the page
pub const DEFAULT_STREAMING_ASSETS_URL: &str = "StreamingAssets";
/// Canvas events suppressed unless the caller says otherwise
pub const DEFAULT_DISABLED_CANVAS_EVENTS: &[&str] = &["contextmenu", "dragstart"];

/// WebGL context creation attributes forwarded to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebGlContextAttributes {
    #[serde(default)]
    pub preserve_drawing_buffer: bool,
    #[serde(default = "default_power_preference")]
    pub power_preference: u8,
    /// Attributes the loader does not interpret
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

fn default_power_preference() -> u8 {
    2
}

impl Default for WebGlContextAttributes {
    fn default() -> Self {
        Self {
            preserve_drawing_buffer: false,
            power_preference: default_power_preference(),
            other: Map::new(),
        }
    }
}

/// Caller-supplied configuration.
///
/// Absent and `null` are both treated as "missing". Keys the loader does not
/// recognize land in `extensions` and are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    pub company_name: Option<String>,
    pub product_name: Option<String>,
    pub product_version: Option<String>,
    pub disabled_canvas_events: Option<Vec<String>>,
    pub streaming_assets_url: Option<String>,
    pub webgl_context_attributes: Option<WebGlContextAttributes>,
    pub data_url: Option<String>,
    pub framework_url: Option<String>,
    pub code_url: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl LoaderConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_json(&text)
    }
}

/// A required option that was missing and replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultedOption {
    pub key: &'static str,
    pub fallback: &'static str,
}

/// Configuration after defaults have been applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub company_name: String,
    pub product_name: String,
    pub product_version: String,
    pub disabled_canvas_events: Vec<String>,
    /// Always absolute
    pub streaming_assets_url: Url,
    pub webgl_context_attributes: WebGlContextAttributes,
    pub data_url: Option<String>,
    pub framework_url: Option<String>,
    pub code_url: Option<String>,
    pub extensions: Map<String, Value>,
    /// Required options that fell back to their defaults, one per warning
    #[serde(skip)]
    pub defaulted: Vec<DefaultedOption>,
}

impl ResolvedConfig {
    /// Cache policy for an asset request: the data file is revalidated,
    /// everything else bypasses the cache.
    pub fn cache_control(&self, url: &str) -> &'static str {
        match &self.data_url {
            Some(data_url) if data_url == url => "must-revalidate",
            _ => "no-store",
        }
    }

    /// Look up a pass-through option
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }
}

fn ensure_option(
    value: Option<String>,
    key: &'static str,
    fallback: &'static str,
    defaulted: &mut Vec<DefaultedOption>,
) -> String {
    match value {
        Some(value) => value,
        None => {
            warn!(
                "Config option \"{}\" is missing or empty. Falling back to default value: \"{}\". \
                 Consider updating your WebGL template to include the missing config option.",
                key, fallback
            );
            defaulted.push(DefaultedOption { key, fallback });
            fallback.to_string()
        }
    }
}

/// Resolve an asset base URL against the page location.
///
/// Relative paths, absolute paths and full URLs all come out absolute.
pub fn resolve_asset_url(page_url: &Url, value: &str) -> Result<Url, ConfigError> {
    page_url.join(value).map_err(|source| ConfigError::InvalidUrl {
        url: value.to_string(),
        source,
    })
}

/// Merge the caller's configuration with the built-in defaults.
pub fn resolve(config: &LoaderConfig, page_url: &Url) -> Result<ResolvedConfig, ConfigError> {
    let config = config.clone();
    let mut defaulted = Vec::new();

    let company_name = ensure_option(
        config.company_name,
        "companyName",
        DEFAULT_COMPANY_NAME,
        &mut defaulted,
    );
    let product_name = ensure_option(
        config.product_name,
        "productName",
        DEFAULT_PRODUCT_NAME,
        &mut defaulted,
    );
    let product_version = ensure_option(
        config.product_version,
        "productVersion",
        DEFAULT_PRODUCT_VERSION,
        &mut defaulted,
    );

    let streaming_assets = config
        .streaming_assets_url
        .as_deref()
        .unwrap_or(DEFAULT_STREAMING_ASSETS_URL);
    let streaming_assets_url = resolve_asset_url(page_url, streaming_assets)?;

    let disabled_canvas_events = config.disabled_canvas_events.unwrap_or_else(|| {
        DEFAULT_DISABLED_CANVAS_EVENTS
            .iter()
            .map(|event| event.to_string())
            .collect()
    });

    Ok(ResolvedConfig {
        company_name,
        product_name,
        product_version,
        disabled_canvas_events,
        streaming_assets_url,
        webgl_context_attributes: config.webgl_context_attributes.unwrap_or_default(),
        data_url: config.data_url,
        framework_url: config.framework_url,
        code_url: config.code_url,
        extensions: config.extensions,
        defaulted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn page() -> Url {
        Url::parse("https://games.example.com/play/index.html").unwrap()
    }

    fn complete() -> LoaderConfig {
        LoaderConfig {
            company_name: Some("Acme".to_string()),
            product_name: Some("Rocket".to_string()),
            product_version: Some("2.3".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_config_has_no_warnings() {
        let resolved = resolve(&complete(), &page()).unwrap();
        assert!(resolved.defaulted.is_empty());
        assert_eq!(resolved.company_name, "Acme");
        assert_eq!(resolved.product_name, "Rocket");
        assert_eq!(resolved.product_version, "2.3");
    }

    #[test]
    fn test_missing_keys_get_defaults_with_one_warning_each() {
        let resolved = resolve(&LoaderConfig::default(), &page()).unwrap();
        assert_eq!(resolved.company_name, DEFAULT_COMPANY_NAME);
        assert_eq!(resolved.product_name, DEFAULT_PRODUCT_NAME);
        assert_eq!(resolved.product_version, DEFAULT_PRODUCT_VERSION);

        let keys: Vec<_> = resolved.defaulted.iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["companyName", "productName", "productVersion"]);

        let mut partial = complete();
        partial.product_version = None;
        let resolved = resolve(&partial, &page()).unwrap();
        assert_eq!(resolved.defaulted.len(), 1);
        assert_eq!(resolved.defaulted[0].key, "productVersion");
        assert_eq!(resolved.defaulted[0].fallback, "1.0");
        assert_eq!(resolved.company_name, "Acme");
    }

    #[test]
    fn test_null_counts_as_missing() {
        let config = LoaderConfig::from_json(
            r#"{"companyName": null, "productName": "Rocket", "productVersion": "1.1"}"#,
        )
        .unwrap();
        let resolved = resolve(&config, &page()).unwrap();
        assert_eq!(resolved.company_name, "Unity");
        assert_eq!(resolved.defaulted.len(), 1);
    }

    #[test]
    fn test_caller_config_is_not_mutated() {
        let config = LoaderConfig::default();
        let before = config.clone();
        let _ = resolve(&config, &page()).unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn test_streaming_assets_url_resolution() {
        let cases = [
            (None, "https://games.example.com/play/StreamingAssets"),
            (Some("Assets/Stream"), "https://games.example.com/play/Assets/Stream"),
            (Some("/cdn/stream"), "https://games.example.com/cdn/stream"),
            (Some("../shared"), "https://games.example.com/shared"),
            (
                Some("https://cdn.example.net/stream/"),
                "https://cdn.example.net/stream/",
            ),
        ];

        for (input, expected) in cases {
            let mut config = complete();
            config.streaming_assets_url = input.map(str::to_string);
            let resolved = resolve(&config, &page()).unwrap();
            assert_eq!(resolved.streaming_assets_url.as_str(), expected, "input {:?}", input);
        }
    }

    #[test]
    fn test_invalid_streaming_assets_url() {
        let mut config = complete();
        config.streaming_assets_url = Some("http://[::1".to_string());
        let err = resolve(&config, &page()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_defaults_for_canvas_events_and_context_attributes() {
        let resolved = resolve(&complete(), &page()).unwrap();
        assert_eq!(resolved.disabled_canvas_events, vec!["contextmenu", "dragstart"]);
        assert!(!resolved.webgl_context_attributes.preserve_drawing_buffer);
        assert_eq!(resolved.webgl_context_attributes.power_preference, 2);

        let mut config = complete();
        config.disabled_canvas_events = Some(Vec::new());
        let resolved = resolve(&config, &page()).unwrap();
        assert!(resolved.disabled_canvas_events.is_empty());
    }

    #[test]
    fn test_extensions_pass_through() {
        let config = LoaderConfig::from_json(
            r#"{
                "companyName": "Acme",
                "productName": "Rocket",
                "productVersion": "2.3",
                "matchWebGLToCanvasSize": false,
                "webglContextAttributes": {"preserveDrawingBuffer": true, "antialias": false}
            }"#,
        )
        .unwrap();
        let resolved = resolve(&config, &page()).unwrap();
        assert_eq!(
            resolved.extension("matchWebGLToCanvasSize"),
            Some(&Value::Bool(false))
        );
        assert!(resolved.webgl_context_attributes.preserve_drawing_buffer);
        assert_eq!(resolved.webgl_context_attributes.power_preference, 2);
        assert_eq!(
            resolved.webgl_context_attributes.other.get("antialias"),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn test_cache_control() {
        let mut config = complete();
        config.data_url = Some("Build/game.data".to_string());
        let resolved = resolve(&config, &page()).unwrap();
        assert_eq!(resolved.cache_control("Build/game.data"), "must-revalidate");
        assert_eq!(resolved.cache_control("Build/game.wasm"), "no-store");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"productName": "Rocket", "codeUrl": "Build/game.wasm"}}"#).unwrap();

        let config = LoaderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.product_name.as_deref(), Some("Rocket"));
        assert_eq!(config.code_url.as_deref(), Some("Build/game.wasm"));
        assert!(config.company_name.is_none());

        let missing = LoaderConfig::from_file("/nonexistent/loader.json").unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
