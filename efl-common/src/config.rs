//! Configuration file loading

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional settings read from the TOML config file
///
/// Every field is optional; the service fills in defaults for anything the
/// file does not set. Unknown keys are ignored so older files keep working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the Esploro API gateway
    pub gateway_url: Option<String>,
    /// API key for the Esploro REST API
    pub api_key: Option<String>,
    /// Identifier of the remote file import job
    pub import_job_id: Option<String>,
    /// Delay between per-asset file submissions, in milliseconds
    pub inter_asset_delay_ms: Option<u64>,
    /// Job poll interval, in seconds
    pub poll_interval_secs: Option<u64>,
    /// Hard cap on job monitoring, in seconds
    pub poll_timeout_secs: Option<u64>,
    /// Maximum accepted CSV upload size, in bytes
    pub max_csv_bytes: Option<u64>,
    /// Listen host
    pub host: Option<String>,
    /// Listen port
    pub port: Option<u16>,
}

/// Parse a TOML config file from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Default configuration file path for the platform
///
/// Priority on Linux: `~/.config/efl/efl-loader.toml`, then
/// `/etc/efl/efl-loader.toml`. Other platforms use the OS config directory.
pub fn default_config_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        let user_config = dirs::config_dir().map(|d| d.join("efl").join("efl-loader.toml"));
        let system_config = PathBuf::from("/etc/efl/efl-loader.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else if cfg!(target_os = "macos") || cfg!(target_os = "windows") {
        let path = dirs::config_dir()
            .map(|d| d.join("efl").join("efl-loader.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    } else {
        Err(Error::Config("Unsupported platform".to_string()))
    }
}

/// Load the platform-default config file, falling back to empty settings
/// when no file exists
pub fn load_default_config() -> TomlConfig {
    match default_config_path() {
        Ok(path) => match load_toml_config(&path) {
            Ok(config) => {
                tracing::debug!("Loaded config file {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable config file: {}", e);
                TomlConfig::default()
            }
        },
        Err(_) => TomlConfig::default(),
    }
}
