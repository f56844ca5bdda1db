//! Integration tests for config file resolution
//!
//! Tests that manipulate CVIS_CONFIG are marked #[serial] so they never run in
//! parallel with each other.

use cvis_common::config::{load_or_default, resolve_config_path, CONFIG_ENV_VAR};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
struct DeviceSettings {
    queue_capacity: usize,
    label: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 5,
            label: "default".to_string(),
        }
    }
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("from_env.toml");
    std::fs::write(&path, "queue_capacity = 9\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    let loaded: DeviceSettings = load_or_default(None, CONFIG_ENV_VAR).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(path));
    assert_eq!(loaded.queue_capacity, 9);
    assert_eq!(loaded.label, "default");
}

#[test]
#[serial]
fn test_cli_arg_overrides_env_var() {
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join("env.toml");
    let cli_path = dir.path().join("cli.toml");
    std::fs::write(&env_path, "label = \"env\"\n").unwrap();
    std::fs::write(&cli_path, "label = \"cli\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let loaded: DeviceSettings = load_or_default(Some(&cli_path), CONFIG_ENV_VAR).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(loaded.label, "cli");
}

#[test]
#[serial]
fn test_explicit_env_file_with_bad_syntax_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "queue_capacity = [\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let loaded: cvis_common::Result<DeviceSettings> = load_or_default(None, CONFIG_ENV_VAR);
    env::remove_var(CONFIG_ENV_VAR);

    assert!(loaded.is_err());
}

#[test]
#[serial]
fn test_empty_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "");
    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    env::remove_var(CONFIG_ENV_VAR);

    // Falls through to platform locations, which never name an empty path
    assert_ne!(resolved, Some(PathBuf::new()));
}
