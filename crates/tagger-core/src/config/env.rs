//! Environment overrides applied on top of the config file.
//!
//! Recognized variables:
//! - `PROREF_MODEL_DIR`: model directory, as set by the host application
//! - `TAGGER_MODEL_DIR`: model directory, used only when `PROREF_MODEL_DIR` is unset
//! - `HF_ENDPOINT`: hub endpoint
//! - `HF_HUB_DOWNLOAD_TIMEOUT`: per-read transfer timeout in seconds
//! - `HF_HUB_ETAG_TIMEOUT`: metadata lookup timeout in seconds
//!
//! Empty values are treated as unset.

use std::path::PathBuf;

use crate::error::ConfigError;

use super::Config;

pub const MODEL_DIR_VAR: &str = "PROREF_MODEL_DIR";
pub const MODEL_DIR_ALIAS_VAR: &str = "TAGGER_MODEL_DIR";
pub const ENDPOINT_VAR: &str = "HF_ENDPOINT";
pub const DOWNLOAD_TIMEOUT_VAR: &str = "HF_HUB_DOWNLOAD_TIMEOUT";
pub const METADATA_TIMEOUT_VAR: &str = "HF_HUB_ETAG_TIMEOUT";

/// Snapshot of the environment variables that affect configuration.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub model_dir: Option<String>,
    pub endpoint: Option<String>,
    pub download_timeout: Option<String>,
    pub metadata_timeout: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the current process environment.
    pub fn from_process() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            model_dir: read(MODEL_DIR_VAR).or_else(|| read(MODEL_DIR_ALIAS_VAR)),
            endpoint: read(ENDPOINT_VAR),
            download_timeout: read(DOWNLOAD_TIMEOUT_VAR),
            metadata_timeout: read(METADATA_TIMEOUT_VAR),
        }
    }

    /// One override set per present variable, so each can be applied on its own.
    pub fn split(&self) -> Vec<EnvOverrides> {
        let mut parts = Vec::new();
        if let Some(v) = &self.model_dir {
            parts.push(Self { model_dir: Some(v.clone()), ..Default::default() });
        }
        if let Some(v) = &self.endpoint {
            parts.push(Self { endpoint: Some(v.clone()), ..Default::default() });
        }
        if let Some(v) = &self.download_timeout {
            parts.push(Self { download_timeout: Some(v.clone()), ..Default::default() });
        }
        if let Some(v) = &self.metadata_timeout {
            parts.push(Self { metadata_timeout: Some(v.clone()), ..Default::default() });
        }
        parts
    }

    pub(super) fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(dir) = &self.model_dir {
            tracing::debug!("Environment overrides model_dir: {dir}");
            config.general.model_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = &self.endpoint {
            config.hub.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(raw) = &self.download_timeout {
            config.hub.download_timeout_secs = parse_secs(DOWNLOAD_TIMEOUT_VAR, raw)?;
        }
        if let Some(raw) = &self.metadata_timeout {
            config.hub.metadata_timeout_secs = parse_secs(METADATA_TIMEOUT_VAR, raw)?;
        }
        Ok(())
    }
}

/// Parse a timeout in seconds. Fractional values round up to whole seconds.
fn parse_secs(var: &str, raw: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::EnvError {
        var: var.to_string(),
        value: raw.to_string(),
    };
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(secs);
    }
    let secs = raw.parse::<f64>().map_err(|_| invalid())?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid());
    }
    Ok(secs.ceil() as u64)
}
