//! Configuration management for threadwatch.
//!
//! Configuration is read from `~/.config/threadwatch/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::loader::DEFAULT_WATCH_TIMEOUTS;

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub loader: LoaderConfig,
    pub store: StoreConfig,
}

/// Settings for the shared HTTP client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent sent with every request
    pub user_agent: String,

    /// Connect timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds (default: 30)
    pub read_timeout_secs: u64,

    /// Limit on a whole request, uploads included, in seconds (default: 120)
    pub request_timeout_secs: u64,

    /// Maximum requests in flight across all loaders (default: 10)
    pub max_concurrent_requests: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("threadwatch/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            request_timeout_secs: 120,
            max_concurrent_requests: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Delays in seconds between polls of a thread that stopped growing.
    /// Each unchanged poll moves one step further; new posts reset to the
    /// first step. An empty list uses the built-in ladder.
    pub watch_timeouts: Vec<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            watch_timeouts: DEFAULT_WATCH_TIMEOUTS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from `path`, creating the commented default there if missing.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/threadwatch/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("threadwatch").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# threadwatch configuration

[http]
# User agent sent with every request (defaults to "threadwatch/<version>")
# user_agent = "threadwatch"

# Connect and read timeouts in seconds
connect_timeout_secs = 30
read_timeout_secs = 30

# Limit on a whole request, including posting a file
request_timeout_secs = 120

# Maximum requests in flight across all watched threads
max_concurrent_requests = 10

[loader]
# Seconds between polls of a thread. Every poll without new posts moves one
# step to the right; new posts start over from the first value.
watch_timeouts = [10, 15, 20, 30, 60, 90, 120, 180, 240, 300, 600, 1800, 3600]

[store]
# SQLite database file (defaults to the platform data directory)
# database_path = "/path/to/threadwatch.db"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
