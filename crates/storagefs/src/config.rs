//! Provider configuration.
//!
//! Hosts either build an [`FsConfig`] with the builder methods or load one from
//! JSON (e.g. a settings file) with [`FsConfig::from_json`].

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::logging_impl::LogConfig;

/// Default broadcast capacity for change notifications.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a [`StorageFs`](crate::StorageFs) instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Relative paths the host probes speculatively (workspace config files).
    /// Not-found failures on these are logged quietly.
    pub probe_paths: Vec<String>,

    /// Root names the host probes speculatively.
    pub probe_root_names: Vec<String>,

    /// Capacity of the change-notification channel.
    /// Default: 256
    pub event_capacity: usize,

    /// Log redaction settings.
    #[serde(skip)]
    pub log: LogConfig,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            probe_paths: [
                "pom.xml",
                "node_modules",
                ".vscode",
                ".vscode/settings.json",
                ".vscode/tasks.json",
                ".vscode/launch.json",
                ".git/config",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            probe_root_names: ["pom.xml", "node_modules", ".git", ".vscode"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            log: LogConfig::default(),
        }
    }
}

impl FsConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidOperation(format!("invalid config: {e}")))
    }

    /// Add a relative path to the probe list
    pub fn probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_paths.push(path.into());
        self
    }

    /// Add a root name to the probe list
    pub fn probe_root_name(mut self, name: impl Into<String>) -> Self {
        self.probe_root_names.push(name.into());
        self
    }

    /// Set change-notification channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set log redaction settings
    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_vscode_probes() {
        let config = FsConfig::new();
        assert!(config.probe_paths.iter().any(|p| p == ".vscode/settings.json"));
        assert!(config.probe_root_names.iter().any(|p| p == ".git"));
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn json_overrides_only_given_fields() {
        let config = FsConfig::from_json(r#"{"event_capacity": 8}"#).unwrap();
        assert_eq!(config.event_capacity, 8);
        assert!(!config.probe_paths.is_empty());
    }

    #[test]
    fn invalid_json_is_rejected() {
        let err = FsConfig::from_json("{not json").unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn builder_appends() {
        let config = FsConfig::new().probe_path("Cargo.toml").event_capacity(4);
        assert!(config.probe_paths.iter().any(|p| p == "Cargo.toml"));
        assert_eq!(config.event_capacity, 4);
    }
}
