//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where model artifacts are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.tagger/model"),
        }
    }
}

/// Remote hub settings for `--download-model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub base URL (files resolve under `{endpoint}/{repo_id}/resolve/{revision}/`)
    pub endpoint: String,

    /// Repository holding the model artifacts
    pub repo_id: String,

    /// Branch, tag or commit to download from
    pub revision: String,

    /// Per-read timeout while streaming a file body, in seconds
    pub download_timeout_secs: u64,

    /// Timeout for the metadata (size) lookup, in seconds
    pub metadata_timeout_secs: u64,

    /// Attempts per file before giving up
    pub max_attempts: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://hf-mirror.com".to_string(),
            repo_id: "Xenova/clip-vit-base-patch32".to_string(),
            revision: "main".to_string(),
            download_timeout_secs: 120,
            metadata_timeout_secs: 30,
            max_attempts: 5,
        }
    }
}

impl HubConfig {
    /// Body read timeout as a `Duration`.
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Metadata lookup timeout as a `Duration`.
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

/// Image analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Longest edge images are shrunk to before analysis
    pub max_edge: u32,

    /// Number of palette clusters for dominant color extraction
    pub palette_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_edge: 150,
            palette_size: 5,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
