use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub clean: CleanConfig,
    pub plugins: PluginsConfig,
    pub privilege: PrivilegeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of plugins scanned at once
    pub max_workers: usize,
    /// Per-plugin scan timeout in seconds
    pub plugin_timeout: u64,
    /// How long to wait for in-flight plugins after a cancel, in milliseconds
    pub cancel_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Parallel clean jobs for unprivileged items
    pub parallel_jobs: usize,
    /// Record completed cleans in the history file
    pub record_history: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Extra drop-in directories, searched after the system and user ones
    pub extra_dirs: Vec<PathBuf>,
    /// Skip the system-wide drop-in directory
    pub skip_system_dir: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegeConfig {
    /// Timeout for the elevated helper in seconds
    pub helper_timeout: u64,
    /// Escalation program
    pub pkexec: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            plugin_timeout: 120,
            cancel_grace_ms: 2000,
        }
    }
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            parallel_jobs: 4,
            record_history: true,
        }
    }
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            helper_timeout: 300,
            pkexec: PathBuf::from("pkexec"),
        }
    }
}

impl EngineConfig {
    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_timeout)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields the
    /// default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ParseError {
                path: path.clone(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/sweep/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sweep").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_workers must be at least 1".into(),
            ));
        }
        if self.engine.plugin_timeout == 0 {
            return Err(ConfigError::Invalid(
                "engine.plugin_timeout must be greater than 0".into(),
            ));
        }
        if self.clean.parallel_jobs == 0 {
            return Err(ConfigError::Invalid(
                "clean.parallel_jobs must be at least 1".into(),
            ));
        }
        if self.privilege.helper_timeout == 0 {
            return Err(ConfigError::Invalid(
                "privilege.helper_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
