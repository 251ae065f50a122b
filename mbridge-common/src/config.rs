//! Configuration loading and config file resolution
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MBRIDGE_CONFIG`)
//! 3. Per-user config directory (`<config_dir>/mbridge/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing or unreadable config file is never fatal: the loader continues
//! with compiled defaults and reports why through [`ConfigSource`], which the
//! binary logs once its subscriber is installed.

use crate::events::SuggestionKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MBRIDGE_CONFIG";

/// Default debounce interval between the last keystroke and a lookup
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Default diagnostics EventBus capacity
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 100;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Incremental search configuration (optional)
    #[serde(default)]
    pub search: SearchConfig,

    /// Progress relay configuration (optional)
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Incremental address search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Debounce interval in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Family of addresses requested from the lookup service
    #[serde(default)]
    pub suggestion_kind: SuggestionKind,

    /// Base URL of the suggestion service (None = canned suggestions)
    #[serde(default)]
    pub lookup_url: Option<String>,

    /// Per-request timeout for the suggestion service
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            suggestion_kind: SuggestionKind::default(),
            lookup_url: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Progress relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Diagnostics EventBus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_event_bus_capacity() -> usize {
    DEFAULT_EVENT_BUS_CAPACITY
}

impl TomlConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.relay.event_bus_capacity == 0 {
            return Err(Error::Config(
                "relay.event_bus_capacity must be greater than zero".to_string(),
            ));
        }
        if self.search.request_timeout_ms == 0 {
            return Err(Error::Config(
                "search.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration following the resolution priority order
    ///
    /// Falls back to compiled defaults when no file is found or the file
    /// cannot be parsed. Nothing is logged here: the returned
    /// [`ConfigSource`] is reported once logging is up.
    pub fn load(cli_path: Option<&Path>) -> (Self, ConfigSource) {
        match resolve_config_path(cli_path) {
            Some(path) => match Self::from_file(&path) {
                Ok(config) => (config, ConfigSource::File(path)),
                Err(e) => (
                    Self::default(),
                    ConfigSource::Fallback {
                        path,
                        reason: e.to_string(),
                    },
                ),
            },
            None => (Self::default(), ConfigSource::Defaults),
        }
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// This file was selected but could not be used; defaults apply
    Fallback { path: PathBuf, reason: String },
    /// No file found; compiled defaults
    Defaults,
}

impl ConfigSource {
    /// Log how the configuration was obtained
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                info!("Loaded configuration from {}", path.display());
            }
            ConfigSource::Fallback { path, reason } => {
                warn!(
                    "Failed to load config {}: {} (using defaults)",
                    path.display(),
                    reason
                );
            }
            ConfigSource::Defaults => {
                info!("No config file found, using compiled defaults");
            }
        }
    }
}

/// Resolve which config file to read, if any
///
/// CLI and environment paths are returned even when the file is missing so
/// the caller can report the failure; the per-user default location is only
/// returned when it exists.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config directory
    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (`~/.config/mbridge/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mbridge").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = TomlConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.search.debounce(), Duration::from_millis(500));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = TomlConfig::from_toml_str("[relay]\nevent_bus_capacity = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
