//! Configuration struct, defaults, loading and validation.

use crate::error::ConfigError;
use crate::types::{EngineKind, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "GVRENDER_CONFIG";

/// Default Kroki server URL when none is configured.
pub const DEFAULT_SERVER_URL: &str = "https://kroki.io";

/// Default ceiling for engine selection, in seconds.
pub const DEFAULT_INIT_TIMEOUT_SECS: u64 = 120;

fn default_engines() -> Vec<EngineKind> {
    EngineKind::DEFAULT_ORDER.to_vec()
}

fn default_init_timeout_secs() -> u64 {
    DEFAULT_INIT_TIMEOUT_SECS
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_server_timeout_secs() -> u64 {
    30
}

/// Top-level configuration, usually read from `~/.config/gvrender/config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Engine priority order for the default engine list.
    #[serde(default = "default_engines")]
    pub engines: Vec<EngineKind>,

    /// How long callers wait for an engine to become ready.
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,

    #[serde(default)]
    pub cmdline: CommandLineConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub log_level: LogLevel,
}

/// Settings for the subprocess engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandLineConfig {
    /// Explicit path to the `dot` executable. Searched on `PATH` when unset.
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

/// Settings for the remote engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of a Kroki-compatible server.
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Global timeout for each HTTP request, in seconds.
    #[serde(default = "default_server_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            timeout_secs: default_server_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engines: default_engines(),
            init_timeout_secs: default_init_timeout_secs(),
            cmdline: CommandLineConfig::default(),
            server: ServerConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load the config file, or defaults when it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            log::info!("Loading config from {:?}", config_path);
            Self::load_from(&config_path)
        } else {
            log::debug!("No config at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load and validate a config file at an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate YAML config contents.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to unit, not to a mapping
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml_ng::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.init_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "init_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.server.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.timeout_secs must be greater than zero".to_string(),
            ));
        }
        let url = self.server.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "server.url '{url}' must start with http:// or https://"
            )));
        }
        for (i, kind) in self.engines.iter().enumerate() {
            if self.engines[..i].contains(kind) {
                return Err(ConfigError::Validation(format!(
                    "engine '{kind}' is listed more than once"
                )));
            }
        }
        Ok(())
    }

    /// Engine selection ceiling as a `Duration`.
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// Server request timeout as a `Duration`.
    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    /// Path of the config file (`$GVRENDER_CONFIG` wins when set).
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.yaml")
    }

    /// Directory holding gvrender configuration.
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("gvrender")
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            // XDG convention on all other platforms: ~/.config/gvrender
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("gvrender")
            } else {
                PathBuf::from(".")
            }
        }
    }
}
