//! Logging initialization.
//!
//! stdout carries protocol responses and download events, so every log line
//! is written to stderr regardless of format.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` if `verbose`, else `info`.
pub fn init(verbose: bool, json_format: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // The host usually captures stderr into a log file, so no colors.
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }
}

/// Initialize from the `[logging]` section, with CLI flags taking precedence.
pub fn init_from_config(config: &tagger_core::Config, verbose: bool, json_logs: bool) {
    let verbose = verbose || matches!(config.logging.level.as_str(), "debug" | "trace");
    let json_format = json_logs || config.logging.format == "json";
    init(verbose, json_format);
}
