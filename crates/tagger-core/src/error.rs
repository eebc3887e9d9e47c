//! Error types for the tagger sidecar.
//!
//! Errors are organized by concern so that each layer reports failures with
//! the context the caller needs (file names, stage, HTTP status).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tagger operations.
#[derive(Error, Debug)]
pub enum TaggerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image or embedding pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Model download errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// An environment override could not be interpreted
    #[error("Invalid value for {var}: {value:?}")]
    EnvError { var: String, value: String },

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Image decoding and embedding errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Embedding generation failed
    #[error("Embedding failed for {path}: {message}")]
    Embedding { path: PathBuf, message: String },

    /// Model loading or inference setup failed
    #[error("Model error: {message}")]
    Model { message: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Failure of a single HTTP transfer attempt.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The hub has no such file (HTTP 404)
    #[error("{url} not found on hub")]
    NotFound { url: String },

    /// The server refused the requested byte range (HTTP 416)
    #[error("range not satisfiable for {url}")]
    RangeNotSatisfiable { url: String },

    /// Any other non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The request or a body read timed out
    #[error("timed out: {0}")]
    Timeout(String),

    /// Connection-level failure (DNS, reset, TLS)
    #[error("network error: {0}")]
    Network(String),

    /// The body ended before the expected number of bytes arrived
    #[error("incomplete transfer: expected {expected} bytes, got {actual}")]
    Incomplete { expected: u64, actual: u64 },

    /// Writing the temp file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, connection failures, short bodies, local I/O errors, rate
    /// limits (429) and server errors (5xx) are retryable. A missing file is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound { .. } => false,
            Self::RangeNotSatisfiable { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Timeout(_) | Self::Network(_) | Self::Incomplete { .. } | Self::Io(_) => true,
        }
    }
}

/// Manager-level failures that abort `--download-model`.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// A required file does not exist on the hub
    #[error("required file {filename} not found on hub")]
    RequiredMissing { filename: String },

    /// A required file kept failing until attempts ran out
    #[error("failed to download {filename}: {message}")]
    RequiredFailed { filename: String, message: String },

    /// No weight candidate could be downloaded
    #[error("failed to download model weights")]
    NoWeights,

    /// Building the HTTP client failed
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// Local filesystem failure outside of a transfer
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for tagger results.
pub type Result<T> = std::result::Result<T, TaggerError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
