//! CLIP ONNX session management and inference.
//!
//! Runs the combined CLIP export, which takes `input_ids`, `pixel_values` and
//! (depending on the export) `attention_mask` in one graph and produces both
//! `image_embeds` and `text_embeds`. Each call feeds a placeholder for the
//! modality it does not need and reads only the output it asked for.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use super::preprocess;
use crate::error::{PipelineError, PipelineResult};

/// CLIP's text context length, including start and end tokens.
pub const MAX_TOKENS: usize = 77;

const IMAGE_OUTPUT: &str = "image_embeds";
const TEXT_OUTPUT: &str = "text_embeds";

/// Wraps an ONNX Runtime session and the tokenizer for CLIP.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
pub struct ClipEncoder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    /// Whether the exported graph declares an `attention_mask` input.
    has_attention_mask: bool,
}

impl ClipEncoder {
    /// Load the model weights and `tokenizer.json`.
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> PipelineResult<Self> {
        let session = Session::builder()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to load {}: {e}", model_path.display()),
            })?;

        let tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path).map_err(|e| {
            PipelineError::Model {
                message: format!("Failed to load tokenizer: {e}"),
            }
        })?;

        let has_attention_mask = session
            .inputs()
            .iter()
            .any(|i| i.name() == "attention_mask");

        tracing::debug!(
            "Loaded CLIP model from {:?} (inputs: {:?}, outputs: {:?})",
            model_path,
            session
                .inputs()
                .iter()
                .map(|i| i.name())
                .collect::<Vec<_>>(),
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            has_attention_mask,
        })
    }

    /// L2-normalized embedding of a decoded image.
    pub fn encode_image(&self, image: &DynamicImage, path: &Path) -> PipelineResult<Vec<f32>> {
        let pixels = preprocess::preprocess(image);
        let ids = self.tokenize("")?;
        self.run(pixels, ids, IMAGE_OUTPUT)
            .map_err(|message| PipelineError::Embedding {
                path: path.to_path_buf(),
                message,
            })
    }

    /// L2-normalized embedding of a text prompt.
    pub fn encode_text(&self, text: &str) -> PipelineResult<Vec<f32>> {
        let ids = self.tokenize(text)?;
        self.run(preprocess::blank(), ids, TEXT_OUTPUT)
            .map_err(|message| PipelineError::Model { message })
    }

    fn tokenize(&self, text: &str) -> PipelineResult<Vec<i64>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| PipelineError::Model {
                message: format!("Tokenization failed: {e}"),
            })?;
        let ids = encoding.get_ids().iter().map(|&id| id as i64).collect();
        Ok(truncate_ids(ids, MAX_TOKENS))
    }

    fn run(&self, pixels: Array4<f32>, ids: Vec<i64>, output: &str) -> Result<Vec<f32>, String> {
        let shape: Vec<i64> = pixels.shape().iter().map(|&d| d as i64).collect();
        let flat: Vec<f32> = pixels.iter().copied().collect();
        let pixel_values = Value::from_array((shape, flat))
            .map_err(|e| format!("Failed to create pixel tensor: {e}"))?;

        let seq_len = ids.len();
        let mask = vec![1i64; seq_len];
        let input_ids = Value::from_array((vec![1i64, seq_len as i64], ids))
            .map_err(|e| format!("Failed to create input_ids tensor: {e}"))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Session lock poisoned: {e}"))?;

        let result = if self.has_attention_mask {
            let attention_mask = Value::from_array((vec![1i64, seq_len as i64], mask))
                .map_err(|e| format!("Failed to create attention_mask tensor: {e}"))?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "pixel_values" => pixel_values,
                "attention_mask" => attention_mask
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "pixel_values" => pixel_values
            ])
        };
        let outputs = result.map_err(|e| format!("ONNX inference failed: {e}"))?;

        let embeds = outputs
            .iter()
            .find(|(name, _)| *name == output)
            .ok_or_else(|| format!("Model did not produce {output}"))?;

        let (shape, data) = embeds
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("Failed to extract {output}: {e}"))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let mut vector = first_row(&dims, data)
            .ok_or_else(|| format!("Unexpected {output} shape: {dims:?}"))?;
        unit_length(&mut vector);
        Ok(vector)
    }
}

/// Scale to unit length so dot products are cosine similarities. Zero stays zero.
fn unit_length(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Cut a token sequence to `max` while keeping the trailing end token.
fn truncate_ids(mut ids: Vec<i64>, max: usize) -> Vec<i64> {
    if ids.len() > max && max > 0 {
        let end = ids[ids.len() - 1];
        ids.truncate(max - 1);
        ids.push(end);
    }
    ids
}

/// The first embedding of a `[dim]` or `[1, dim]` output.
fn first_row(shape: &[i64], data: &[f32]) -> Option<Vec<f32>> {
    match shape {
        [dim] => data.get(..*dim as usize).map(<[f32]>::to_vec),
        [_, dim] => data.get(..*dim as usize).map(<[f32]>::to_vec),
        _ => None,
    }
}
