use std::{env, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file: {0}")]
    ReadFailed(std::io::Error),
    #[error("failed to write config file: {0}")]
    WriteFailed(std::io::Error),
    #[error("failed to parse config file: {0}")]
    ParseFailed(String),
    #[error("no config path available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub monitor: Monitor,
    pub storage: Storage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    /// Per-request timeout applied to every probe, in seconds.
    pub default_timeout_secs: u64,
    /// Retry budget consumed by an outer collaborator; the engine does
    /// not interpret it.
    pub retry_attempts: u32,
    /// Whether scheduled probe failures are forwarded to the notifier.
    pub browser_notifications: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    /// Directory holding the JSON state snapshots.
    pub data_dir: path::PathBuf,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/watchdog/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("watchdog/config.toml"))
}

fn default_data_dir() -> path::PathBuf {
    if let Ok(data_home) = env::var("XDG_DATA_HOME") {
        path::PathBuf::from(data_home).join("watchdog")
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".local/share/watchdog")
    } else {
        path::PathBuf::from("watchdog-data")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: Monitor {
                default_timeout_secs: 30,
                retry_attempts: 3,
                browser_notifications: false,
            },
            storage: Storage { data_dir: default_data_dir() },
        }
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/watchdog/config.toml
    /// or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            toml::from_str(raw_string.as_str()).map_err(|err| Error::ParseFailed(err.to_string()))
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String =
            toml::to_string_pretty(self).map_err(|err| Error::ParseFailed(err.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(Error::WriteFailed)
    }
}

/// The read-only settings view the engine consumes.
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_timeout: Duration,
    pub retry_attempts: u32,
    pub browser_notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from(&Config::default())
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            default_timeout: Duration::from_secs(config.monitor.default_timeout_secs),
            retry_attempts: config.monitor.retry_attempts,
            browser_notifications: config.monitor.browser_notifications,
        }
    }
}
