//! `tagger --download-model`: make the model directory complete.
//!
//! Progress events go to stdout as JSON lines. The exit code tells the host
//! how it went: 0 complete, 2 finished but still incomplete, 1 failed.

use std::process::ExitCode;
use std::sync::Arc;

use tagger_core::download::{AssetDownloadManager, DownloadEvent, EventSink, JsonLinesSink};
use tagger_core::{Config, ConfigError, DownloadError};

const EXIT_INCOMPLETE: u8 = 2;
const EXIT_FAILED: u8 = 1;

/// Map the manager's result to the process exit status.
fn exit_status(result: &Result<bool, DownloadError>) -> u8 {
    match result {
        Ok(true) => 0,
        Ok(false) => EXIT_INCOMPLETE,
        Err(_) => EXIT_FAILED,
    }
}

pub async fn execute(config: &Config) -> ExitCode {
    let sink = Arc::new(JsonLinesSink::new(std::io::stdout()));
    let model_dir = config.model_dir();

    let result = match AssetDownloadManager::from_config(&config.hub, sink.clone()) {
        Ok(manager) => manager.ensure_complete(&model_dir).await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(true) => tracing::info!("Model ready at {}", model_dir.display()),
        Ok(false) => tracing::warn!("Model at {} failed verification", model_dir.display()),
        Err(e) => {
            tracing::error!("Model download failed: {e}");
            sink.emit(&DownloadEvent::Error {
                message: e.to_string(),
            });
        }
    }

    ExitCode::from(exit_status(&result))
}

/// Report a configuration that could not be loaded and return the failure status.
fn report_config_error(sink: &dyn EventSink, error: &ConfigError) -> u8 {
    tracing::error!("Cannot download the model: {error}");
    sink.emit(&DownloadEvent::Error {
        message: format!("invalid configuration: {error}"),
    });
    EXIT_FAILED
}

/// Download mode refuses to guess a target when the configuration is broken.
pub fn config_failed(error: &ConfigError) -> ExitCode {
    let sink = JsonLinesSink::new(std::io::stdout());
    ExitCode::from(report_config_error(&sink, error))
}
