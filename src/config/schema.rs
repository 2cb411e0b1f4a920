//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Template registry configuration, usually read from a YAML document.
///
/// ```yaml
/// dir: testdata/template
/// root: layout
/// minify: true
/// delims: ["[[", "]]"]
/// preload: [a.tmpl, b.tmpl]
/// list:
///   index: [index.tmpl]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TemplateConfig {
    /// Base directory prefixed to every relative filename.
    pub dir: String,

    /// Sub-template selected as the entry point of every compiled set.
    pub root: String,

    /// Enable the minifier for every template of the registry.
    pub minify: bool,

    /// Left and right action delimiters.
    pub delims: Vec<String>,

    /// Files parsed into every template registered afterwards.
    pub preload: Vec<String>,

    /// Component name to source file.
    pub components: BTreeMap<String, String>,

    /// Template name to the files compiled into it.
    pub list: BTreeMap<String, Vec<String>>,
}

impl TemplateConfig {
    /// The configured delimiter pair, if any.
    pub fn delims(&self) -> Option<(&str, &str)> {
        match self.delims.as_slice() {
            [left, right] => Some((left.as_str(), right.as_str())),
            _ => None,
        }
    }
}

/// Root configuration for the demo server binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Where the template document lives.
    pub templates: TemplatesSection,

    /// Route name to path pattern.
    pub routes: BTreeMap<String, String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Template section of the server file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TemplatesSection {
    /// Path of the YAML template document. Empty means no templates.
    pub config_path: String,
}
