//! The fixed set of model artifacts and the completeness rule for a model
//! directory.

use std::path::{Path, PathBuf};

use crate::config::HubConfig;

/// How the manager treats a target it cannot fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Must be present; failure aborts the download.
    Required,
    /// Skipped with an `optional-missing` event when unavailable.
    Optional,
    /// One of several weight formats; exactly one must succeed.
    Weight,
}

/// A single file the embedding runtime needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Local file name inside the model directory
    pub name: &'static str,
    /// Path inside the hub repository
    pub remote_path: &'static str,
    pub kind: TargetKind,
}

impl DownloadTarget {
    const fn required(name: &'static str) -> Self {
        Self {
            name,
            remote_path: name,
            kind: TargetKind::Required,
        }
    }

    const fn optional(name: &'static str) -> Self {
        Self {
            name,
            remote_path: name,
            kind: TargetKind::Optional,
        }
    }

    const fn weight(name: &'static str, remote_path: &'static str) -> Self {
        Self {
            name,
            remote_path,
            kind: TargetKind::Weight,
        }
    }
}

const BASE_TARGETS: &[DownloadTarget] = &[
    DownloadTarget::required("config.json"),
    DownloadTarget::required("preprocessor_config.json"),
    DownloadTarget::required("tokenizer.json"),
    DownloadTarget::optional("tokenizer_config.json"),
    DownloadTarget::optional("special_tokens_map.json"),
    DownloadTarget::optional("merges.txt"),
    DownloadTarget::optional("vocab.json"),
];

/// Weight formats in order of preference. The first one that downloads wins.
const WEIGHT_CANDIDATES: &[DownloadTarget] = &[
    DownloadTarget::weight("model.onnx", "onnx/model.onnx"),
    DownloadTarget::weight("model_quantized.onnx", "onnx/model_quantized.onnx"),
];

/// Artifact set for one hub repository.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub repo_id: String,
    pub revision: String,
    pub base: Vec<DownloadTarget>,
    pub weights: Vec<DownloadTarget>,
}

impl Manifest {
    /// The standard CLIP artifact set for the configured repository.
    pub fn clip(hub: &HubConfig) -> Self {
        Self {
            repo_id: hub.repo_id.clone(),
            revision: hub.revision.clone(),
            base: BASE_TARGETS.to_vec(),
            weights: WEIGHT_CANDIDATES.to_vec(),
        }
    }

    /// Number of steps reported to progress consumers.
    pub fn total_steps(&self) -> usize {
        self.base.len() + self.weights.len()
    }

    /// Resolve URL for a target under `endpoint`.
    pub fn url(&self, endpoint: &str, target: &DownloadTarget) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            endpoint.trim_end_matches('/'),
            self.repo_id,
            self.revision,
            target.remote_path
        )
    }

    /// Whether `dir` holds every required file and one weight file, all non-empty.
    pub fn is_complete(&self, dir: &Path) -> bool {
        let required_present = self
            .base
            .iter()
            .filter(|t| t.kind == TargetKind::Required)
            .all(|t| is_present(&dir.join(t.name)));
        required_present && self.installed_weight(dir).is_some()
    }

    /// The first weight candidate already present in `dir`.
    pub fn installed_weight(&self, dir: &Path) -> Option<PathBuf> {
        self.weights
            .iter()
            .map(|t| dir.join(t.name))
            .find(|p| is_present(p))
    }
}

/// A file counts as present only if it exists and is non-empty.
pub fn is_present(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
