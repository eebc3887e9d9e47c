//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.hub.endpoint.starts_with("http://") || self.hub.endpoint.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "hub.endpoint must be an http(s) URL, got {:?}",
                self.hub.endpoint
            )));
        }
        if self.hub.repo_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "hub.repo_id must not be empty".into(),
            ));
        }
        if self.hub.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "hub.max_attempts must be > 0".into(),
            ));
        }
        if self.hub.download_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "hub.download_timeout_secs must be > 0".into(),
            ));
        }
        if self.hub.metadata_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "hub.metadata_timeout_secs must be > 0".into(),
            ));
        }
        if self.analysis.max_edge == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.max_edge must be > 0".into(),
            ));
        }
        if self.analysis.palette_size == 0 || self.analysis.palette_size > 256 {
            return Err(ConfigError::ValidationError(
                "analysis.palette_size must be between 1 and 256".into(),
            ));
        }
        Ok(())
    }
}
