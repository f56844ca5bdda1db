//! Configuration file resolution and loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config file (`~/.config/cvis/config.toml` on Linux)
//! 4. System config file (`/etc/cvis/config.toml`, Linux only)
//!
//! When nothing resolves, callers fall back to compiled defaults. Only a file
//! named explicitly on the command line or in the environment must exist.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CVIS_CONFIG";

/// Directory name under the platform config directory
const CONFIG_DIR_NAME: &str = "cvis";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve which config file to load, if any.
///
/// An explicitly named file (CLI or environment) is returned even if it does not
/// exist so the caller can report it; discovered defaults are only returned when
/// present on disk.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: Platform config locations
    default_config_locations()
        .into_iter()
        .find(|candidate| candidate.exists())
}

/// Platform config file candidates, most specific first
fn default_config_locations() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }

    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }

    candidates
}

/// Parse a TOML config file into `T`.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let parsed = toml::from_str::<T>(&content)?;
    debug!("Loaded config file {}", path.display());
    Ok(parsed)
}

/// Resolve and load configuration, falling back to `T::default()`.
///
/// An explicitly requested file that cannot be read or parsed is an error. A
/// discovered file that fails to parse is reported and replaced by defaults.
pub fn load_or_default<T>(cli_arg: Option<&Path>, env_var_name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let explicit = cli_arg.is_some()
        || std::env::var(env_var_name)
            .map(|v| !v.is_empty())
            .unwrap_or(false);

    match resolve_config_path(cli_arg, env_var_name) {
        Some(path) if explicit => {
            info!("Using config file: {}", path.display());
            load_toml(&path)
        }
        Some(path) => match load_toml(&path) {
            Ok(config) => {
                info!("Using config file: {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring unreadable config file {}: {}", path.display(), e);
                Ok(T::default())
            }
        },
        None => {
            info!("No config file found, using compiled defaults");
            Ok(T::default())
        }
    }
}
