//! Tagger Core - local image analysis for a photo library host.
//!
//! The host application talks to this library through a long-lived sidecar
//! process. Two independent surfaces are exposed:
//!
//! ```text
//! stdin  → RequestLoop → encode-image / encode-text   (CLIP via ONNX Runtime)
//!                      → dominant-color / calculate-tone (pure pixel analysis)
//!        → stdout (one JSON line per request)
//!
//! --download-model → AssetDownloadManager → hub (resumable HTTP) → model dir
//!                  → stdout (one JSON event per step)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tagger_core::{Config, EmbeddingContext, RequestLoop};
//!
//! let config = Config::load()?;
//! let mut embeddings = EmbeddingContext::from_config(&config);
//! let stdin = std::io::stdin().lock();
//! RequestLoop::new(&mut embeddings, &config.analysis).run(stdin, std::io::stdout())?;
//! ```

// Module declarations
pub mod analysis;
pub mod config;
pub mod download;
pub mod embedding;
pub mod error;
pub mod output;
pub mod protocol;

// Re-exports for convenient access
pub use analysis::{ColorAnalyzer, ToneAnalyzer};
pub use config::Config;
pub use download::{AssetDownloadManager, DownloadEvent, EventSink, JsonLinesSink, Manifest};
pub use embedding::{Embedder, EmbeddingContext};
pub use error::{
    ConfigError, DownloadError, PipelineError, PipelineResult, Result, TaggerError, TransferError,
};
pub use output::JsonLinesWriter;
pub use protocol::{Request, RequestLoop, Response};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
