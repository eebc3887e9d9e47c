//! Configuration management for the tagger sidecar.
//!
//! Configuration is layered: built-in defaults, then the optional TOML file in
//! the platform config directory, then environment overrides (see [`env`]).

mod env;
mod types;
mod validate;

pub use env::EnvOverrides;
pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Remote hub settings
    pub hub: HubConfig,

    /// Image analysis settings
    pub analysis: AnalysisConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location, then apply environment
    /// overrides.
    ///
    /// Returns the default configuration (plus overrides) if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&Self::default_path(), &EnvOverrides::from_process())
    }

    /// Load `path` (if present), apply `env`, and validate the result once.
    ///
    /// Validation runs after the overrides so the environment can repair a
    /// value the file got wrong.
    pub fn load_with(path: &Path, env: &EnvOverrides) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::parse_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(env)?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Defaults plus every environment override that is valid on its own.
    ///
    /// Used when [`Config::load`] fails, so a broken config file does not also
    /// discard the host's model directory or endpoint.
    pub fn with_valid_overrides(env: &EnvOverrides) -> Self {
        let mut config = Self::default();
        for part in env.split() {
            let mut candidate = config.clone();
            match candidate.apply_env(&part) {
                Ok(()) => config = candidate,
                Err(e) => tracing::warn!("Ignoring environment override: {e}"),
            }
        }
        config
    }

    /// Apply environment overrides and re-validate.
    pub fn apply_env(&mut self, env: &EnvOverrides) -> Result<(), ConfigError> {
        env.apply(self)?;
        self.validate()
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.tagger.tagger/config.toml
    /// - Linux: ~/.config/tagger/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\tagger\config\config.toml
    ///
    /// Falls back to ~/.tagger/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "tagger", "tagger")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".tagger").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        let path_str = self.general.model_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
