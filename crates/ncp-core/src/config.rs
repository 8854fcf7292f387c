use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "NCP_CONFIG_PATH";
pub const INVENTORY_PATH_ENV: &str = "NCP_INVENTORY_PATH";
pub const LOG_LEVEL_ENV: &str = "NCP_LOG_LEVEL";

const APP_DIR: &str = "netcockpit";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NcpConfig {
    pub inventory_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub ssh: SshSettings,
    pub sot: SotSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub binary: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub strict_host_key_checking: bool,
    /// Fixed platform for every host; autodetect when unset.
    pub device_type: Option<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            binary: "ssh".to_string(),
            port: 22,
            connect_timeout_secs: 10,
            command_timeout_secs: 30,
            strict_host_key_checking: false,
            device_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SotSettings {
    pub request_timeout_secs: u64,
    pub page_size: u64,
    pub insecure: bool,
}

impl Default for SotSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            page_size: 1000,
            insecure: false,
        }
    }
}

impl NcpConfig {
    /// Loads from `$NCP_CONFIG_PATH` or the user config dir; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents).map_err(|reason| ConfigError::Parse {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|err| err.to_string())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Render(err.to_string()))
    }

    pub fn inventory_path(&self) -> PathBuf {
        if let Some(path) = non_empty_env(INVENTORY_PATH_ENV) {
            return PathBuf::from(path);
        }
        self.inventory_path
            .clone()
            .unwrap_or_else(default_inventory_path)
    }

    /// `NCP_LOG_LEVEL` wins over the file; `info` otherwise.
    pub fn log_level(&self) -> String {
        non_empty_env(LOG_LEVEL_ENV)
            .or_else(|| self.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    }
}

pub fn config_path() -> PathBuf {
    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    config_dir().join(APP_DIR).join("config.toml")
}

pub fn default_inventory_path() -> PathBuf {
    state_dir().join(APP_DIR).join("inventory.json")
}

pub fn log_dir() -> PathBuf {
    state_dir().join(APP_DIR).join("logs")
}

fn state_dir() -> PathBuf {
    if let Some(path) = non_empty_env("XDG_STATE_HOME") {
        return PathBuf::from(path);
    }
    home_dir().join(".local/state")
}

fn config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"))
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
