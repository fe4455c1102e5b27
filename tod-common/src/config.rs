//! Configuration file and media root resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the platform config directory
pub const APP_DIR_NAME: &str = "trackordie";

/// Config file name looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Locate the TOML configuration file, in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `<config dir>/trackordie/config.toml` if it exists
///
/// Returns `Ok(None)` when no file is configured and none exists at the
/// default location; callers then run on built-in defaults. An explicitly
/// named file that does not exist is an error.
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf()).map(Some);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return require_existing(PathBuf::from(path)).map(Some);
        }
    }

    // Priority 3: platform config directory
    Ok(default_config_file().filter(|path| path.exists()))
}

/// Resolve the media root folder, in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. Value from the TOML config file
/// 4. `./public` (where the web build keeps its Music folder)
pub fn resolve_media_root(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = config_value {
        return path.to_path_buf();
    }

    PathBuf::from("./public")
}

/// Read and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading configuration from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Default config file location for the platform (may not exist)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn require_existing(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )))
    }
}
