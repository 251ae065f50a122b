//! Unit tests for configuration loading and graceful degradation
//!
//! Tests:
//! - Missing config files SHALL NOT cause termination
//! - Priority order for config file resolution (CLI > env > user dir)
//! - Partial TOML files fill remaining fields with defaults
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate MBRIDGE_CONFIG are marked with #[serial].

use mbridge_common::config::{resolve_config_path, ConfigSource, TomlConfig, CONFIG_ENV_VAR};
use mbridge_common::SuggestionKind;
use serial_test::serial;
use tracing_test::traced_test;
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
    file.write_all(content.as_bytes()).expect("config should be written");
    file
}

#[test]
fn test_partial_config_fills_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        [search]
        debounce_ms = 250
        suggestion_kind = "include_dot_blog"
        "#,
    )
    .expect("partial config should parse");

    assert_eq!(config.search.debounce_ms, 250);
    assert_eq!(config.search.suggestion_kind, SuggestionKind::IncludeDotBlog);
    assert_eq!(config.search.lookup_url, None);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.relay.event_bus_capacity, 100);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = TomlConfig::from_toml_str("[search\ndebounce_ms = ");
    assert!(result.is_err());
}

#[test]
fn test_toml_roundtrip() {
    let mut config = TomlConfig::default();
    config.search.lookup_url = Some("https://suggest.example/v1".to_string());
    config.logging.level = "debug".to_string();

    let toml_str = toml::to_string(&config).unwrap();
    let parsed = TomlConfig::from_toml_str(&toml_str).unwrap();
    assert_eq!(parsed, config);
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/mbridge-env-config.toml");

    let cli = PathBuf::from("/tmp/mbridge-cli-config.toml");
    let resolved = resolve_config_path(Some(&cli));
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli() {
    let file = write_config("[logging]\nlevel = \"warn\"\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let resolved = resolve_config_path(None);
    assert_eq!(resolved.as_deref(), Some(file.path()));

    let (config, source) = TomlConfig::load(None);
    assert_eq!(config.logging.level, "warn");
    assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_config_file_does_not_error() {
    env::remove_var(CONFIG_ENV_VAR);

    let missing = PathBuf::from(format!("/tmp/mbridge-missing-{}.toml", std::process::id()));
    let (config, source) = TomlConfig::load(Some(&missing));

    assert_eq!(config, TomlConfig::default());
    assert!(matches!(source, ConfigSource::Fallback { path, .. } if path == missing));
}

#[test]
#[serial]
fn test_unparseable_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);

    let file = write_config("this is = = not toml");
    let (config, source) = TomlConfig::load(Some(file.path()));

    assert_eq!(config, TomlConfig::default());
    match source {
        ConfigSource::Fallback { path, reason } => {
            assert_eq!(path, file.path());
            assert!(reason.contains("Invalid TOML"), "reason: {}", reason);
        }
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[test]
#[traced_test]
fn test_fallback_source_logs_warning() {
    let source = ConfigSource::Fallback {
        path: PathBuf::from("/etc/mbridge/broken.toml"),
        reason: "Configuration error: Invalid TOML".to_string(),
    };
    source.log();

    assert!(logs_contain("Failed to load config /etc/mbridge/broken.toml"));
    assert!(logs_contain("using defaults"));
}

#[test]
#[traced_test]
fn test_file_source_logs_path() {
    ConfigSource::File(PathBuf::from("/etc/mbridge/config.toml")).log();
    assert!(logs_contain("Loaded configuration from /etc/mbridge/config.toml"));
}
