//! CLIP embedding generation.
//!
//! Images and text prompts are mapped into the same 512-dimensional space by
//! a CLIP model running locally via ONNX Runtime.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tagger_core::config::Config;
//! use tagger_core::embedding::{Embedder, EmbeddingContext};
//!
//! let config = Config::load()?;
//! let mut embeddings = EmbeddingContext::from_config(&config);
//! let vector = embeddings.encode_text("a photo of a cat")?;
//! ```

pub mod clip;
pub mod preprocess;

use std::path::{Path, PathBuf};

use crate::analysis::load_image;
use crate::config::Config;
use crate::download::Manifest;
use crate::error::{PipelineError, PipelineResult};

pub use self::clip::ClipEncoder;

/// Something that turns images and text into comparable vectors.
pub trait Embedder {
    /// L2-normalized embedding of the image at `path`.
    fn encode_image(&mut self, path: &Path) -> PipelineResult<Vec<f32>>;

    /// L2-normalized embedding of `text`.
    fn encode_text(&mut self, text: &str) -> PipelineResult<Vec<f32>>;
}

/// Owns the model directory and loads the encoder on first use.
///
/// Created once at startup and handed to the request loop. It never downloads
/// anything: an incomplete model directory is reported as an error.
pub struct EmbeddingContext {
    model_dir: PathBuf,
    manifest: Manifest,
    encoder: Option<ClipEncoder>,
}

impl EmbeddingContext {
    pub fn new(model_dir: PathBuf, manifest: Manifest) -> Self {
        Self {
            model_dir,
            manifest,
            encoder: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.model_dir(), Manifest::clip(&config.hub))
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn is_loaded(&self) -> bool {
        self.encoder.is_some()
    }

    fn encoder(&mut self) -> PipelineResult<&ClipEncoder> {
        if self.encoder.is_none() {
            let encoder = self.load()?;
            self.encoder = Some(encoder);
        }
        self.encoder.as_ref().ok_or_else(|| PipelineError::Model {
            message: "Encoder unavailable".to_string(),
        })
    }

    fn load(&self) -> PipelineResult<ClipEncoder> {
        let weights = self
            .manifest
            .is_complete(&self.model_dir)
            .then(|| self.manifest.installed_weight(&self.model_dir))
            .flatten()
            .ok_or_else(|| PipelineError::Model {
                message: format!(
                    "Model not found in {}. Run `tagger --download-model` first.",
                    self.model_dir.display()
                ),
            })?;

        tracing::info!("Loading CLIP model from {:?}", weights);
        let encoder = ClipEncoder::load(&weights, &self.model_dir.join("tokenizer.json"))?;
        tracing::info!("CLIP model loaded successfully");
        Ok(encoder)
    }
}

impl Embedder for EmbeddingContext {
    fn encode_image(&mut self, path: &Path) -> PipelineResult<Vec<f32>> {
        let encoder = self.encoder()?;
        let image = load_image(path)?;
        encoder.encode_image(&image, path)
    }

    fn encode_text(&mut self, text: &str) -> PipelineResult<Vec<f32>> {
        self.encoder()?.encode_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;

    #[test]
    fn test_incomplete_model_dir_asks_for_download() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();
        let mut context =
            EmbeddingContext::new(dir.path().to_path_buf(), Manifest::clip(&HubConfig::default()));

        let err = context.encode_text("a cat").unwrap_err();

        assert!(err.to_string().contains("--download-model"));
        assert!(!context.is_loaded());
    }

    #[test]
    fn test_missing_model_checked_before_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut context =
            EmbeddingContext::new(dir.path().join("model"), Manifest::clip(&HubConfig::default()));

        let err = context
            .encode_image(Path::new("/nonexistent/photo.jpg"))
            .unwrap_err();

        assert!(matches!(err, PipelineError::Model { .. }));
    }
}
