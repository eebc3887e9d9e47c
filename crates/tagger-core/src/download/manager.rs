//! Drives the manifest through sequential, retried transfers.

use std::path::Path;
use std::sync::Arc;

use super::events::{DownloadEvent, EventSink};
use super::manifest::{is_present, DownloadTarget, Manifest, TargetKind};
use super::progress::ProgressReporter;
use super::retry::{RetryDecision, RetryState, Sleeper, TokioSleeper};
use super::transfer::{Transfer, TransferOutcome};
use super::transport::{HttpTransport, HubTransport};
use crate::config::HubConfig;
use crate::error::DownloadError;

/// How one target ended after all attempts.
#[derive(Debug, PartialEq, Eq)]
enum FetchResult {
    Fetched,
    NotFound(String),
    Failed(String),
}

/// Makes a model directory complete, reporting every step to an [`EventSink`].
///
/// Files are fetched one at a time in manifest order. Nothing is
/// parallelized, so events arrive strictly in work order.
pub struct AssetDownloadManager {
    endpoint: String,
    manifest: Manifest,
    max_attempts: u32,
    transport: Box<dyn HubTransport>,
    sleeper: Box<dyn Sleeper>,
    sink: Arc<dyn EventSink>,
}

impl AssetDownloadManager {
    pub fn new(
        hub: &HubConfig,
        transport: Box<dyn HubTransport>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            endpoint: hub.endpoint.clone(),
            manifest: Manifest::clip(hub),
            max_attempts: hub.max_attempts,
            transport,
            sleeper: Box::new(TokioSleeper),
            sink,
        }
    }

    /// Production setup: `reqwest` transport and real sleeps.
    pub fn from_config(hub: &HubConfig, sink: Arc<dyn EventSink>) -> Result<Self, DownloadError> {
        let transport = HttpTransport::new(hub)?;
        Ok(Self::new(hub, Box::new(transport), sink))
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn emit(&self, event: DownloadEvent) {
        self.sink.emit(&event);
    }

    /// Download whatever `dir` is missing.
    ///
    /// Returns the result of the final completeness check. An already complete
    /// directory costs no network traffic. Errors mean a required file or every
    /// weight candidate could not be fetched.
    pub async fn ensure_complete(&self, dir: &Path) -> Result<bool, DownloadError> {
        if self.manifest.is_complete(dir) {
            tracing::info!("Model already present at {}", dir.display());
            self.emit(DownloadEvent::Verify { ok: true });
            return Ok(true);
        }

        tokio::fs::create_dir_all(dir).await?;
        let total = self.manifest.total_steps();
        tracing::info!(
            "Downloading {} into {} ({total} files)",
            self.manifest.repo_id,
            dir.display()
        );
        self.emit(DownloadEvent::Start {
            model: self.manifest.repo_id.clone(),
            model_dir: dir.display().to_string(),
            total_files: total,
        });

        for (index, target) in self.manifest.base.iter().enumerate() {
            self.fetch_base(dir, target, index + 1, total).await?;
        }
        self.fetch_weights(dir, total).await?;

        self.emit(DownloadEvent::Done {
            model_dir: dir.display().to_string(),
        });
        let ok = self.manifest.is_complete(dir);
        if !ok {
            tracing::warn!("Model directory {} is still incomplete", dir.display());
        }
        self.emit(DownloadEvent::Verify { ok });
        Ok(ok)
    }

    async fn fetch_base(
        &self,
        dir: &Path,
        target: &DownloadTarget,
        step: usize,
        total: usize,
    ) -> Result<(), DownloadError> {
        let path = dir.join(target.name);
        if is_present(&path) {
            tracing::debug!("{} already present, skipping", target.name);
            self.announce(target, step, total, 1, false);
            return Ok(());
        }

        match (self.fetch_with_retry(dir, target, step, total).await, target.kind) {
            (FetchResult::Fetched, _) => Ok(()),
            (FetchResult::NotFound(_), TargetKind::Required) => {
                Err(DownloadError::RequiredMissing {
                    filename: target.name.to_string(),
                })
            }
            (FetchResult::Failed(message), TargetKind::Required) => {
                Err(DownloadError::RequiredFailed {
                    filename: target.name.to_string(),
                    message,
                })
            }
            (FetchResult::NotFound(message) | FetchResult::Failed(message), _) => {
                tracing::info!("Optional file {} unavailable: {message}", target.name);
                self.emit(DownloadEvent::OptionalMissing {
                    filename: target.name.to_string(),
                    message,
                });
                Ok(())
            }
        }
    }

    /// Accept the first weight candidate that is installed or downloads.
    async fn fetch_weights(&self, dir: &Path, total: usize) -> Result<(), DownloadError> {
        let first_step = self.manifest.base.len() + 1;

        if let Some(installed) = self.manifest.installed_weight(dir) {
            let position = self
                .manifest
                .weights
                .iter()
                .position(|t| dir.join(t.name) == installed);
            if let Some(position) = position {
                let target = &self.manifest.weights[position];
                tracing::debug!("Using installed weights {}", target.name);
                self.announce(target, first_step + position, total, 1, false);
            }
            return Ok(());
        }

        for (index, target) in self.manifest.weights.iter().enumerate() {
            match self.fetch_with_retry(dir, target, first_step + index, total).await {
                FetchResult::Fetched => return Ok(()),
                FetchResult::NotFound(message) => {
                    tracing::info!("Weights {} not on hub", target.name);
                    self.emit(DownloadEvent::WeightMissing {
                        filename: target.name.to_string(),
                        message,
                    });
                }
                FetchResult::Failed(message) => {
                    tracing::warn!("Weights {} failed: {message}", target.name);
                    self.emit(DownloadEvent::WeightFailed {
                        filename: target.name.to_string(),
                        message,
                    });
                }
            }
        }

        Err(DownloadError::NoWeights)
    }

    fn announce(
        &self,
        target: &DownloadTarget,
        step: usize,
        total: usize,
        attempt: u32,
        completed: bool,
    ) {
        self.emit(DownloadEvent::File {
            filename: target.name.to_string(),
            current: step,
            total,
            attempt,
            max_attempts: self.max_attempts,
            completed,
        });
    }

    async fn fetch_with_retry(
        &self,
        dir: &Path,
        target: &DownloadTarget,
        step: usize,
        total: usize,
    ) -> FetchResult {
        let url = self.manifest.url(&self.endpoint, target);
        let mut transfer = Transfer::new(url, dir.join(target.name));
        let mut retry = RetryState::new(self.max_attempts);
        let mut progress = ProgressReporter::new(self.sink.as_ref(), target.name, step, total);

        loop {
            transfer.attempt = retry.attempt;
            self.announce(target, step, total, retry.attempt, false);

            match transfer.run(self.transport.as_ref(), &mut progress).await {
                TransferOutcome::Completed { bytes } => {
                    tracing::info!("Downloaded {} ({bytes} bytes)", target.name);
                    self.announce(target, step, total, retry.attempt, true);
                    return FetchResult::Fetched;
                }
                TransferOutcome::NotFound(message) => {
                    transfer.discard().await;
                    return FetchResult::NotFound(message);
                }
                TransferOutcome::Failed(error) => {
                    let message = error.to_string();
                    match retry.record_failure(message.clone(), error.is_retryable()) {
                        RetryDecision::RetryAfter(delay) => {
                            tracing::warn!(
                                "{} attempt {}/{} failed: {message}; retrying in {}s",
                                target.name,
                                retry.attempt,
                                self.max_attempts,
                                delay.as_secs()
                            );
                            self.emit(DownloadEvent::Retry {
                                filename: target.name.to_string(),
                                attempt: retry.attempt,
                                next_wait_seconds: delay.as_secs(),
                                message,
                            });
                            self.sleeper.sleep(delay).await;
                            retry.advance();
                        }
                        RetryDecision::GiveUp => {
                            transfer.discard().await;
                            return FetchResult::Failed(message);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::download::events::RecordingSink;
    use crate::download::testing::{FakeFile, FakeHub, RecordingSleeper};

    const ENDPOINT: &str = "https://hub.test";

    struct Harness {
        dir: tempfile::TempDir,
        hub: Arc<FakeHub>,
        sink: Arc<RecordingSink>,
        sleeper: Arc<RecordingSleeper>,
        manager: AssetDownloadManager,
    }

    fn hub_config() -> HubConfig {
        HubConfig {
            endpoint: ENDPOINT.into(),
            repo_id: "acme/clip".into(),
            ..HubConfig::default()
        }
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let hub = Arc::new(FakeHub::new());
        let sink = Arc::new(RecordingSink::new());
        let sleeper = Arc::new(RecordingSleeper::default());
        let manager = AssetDownloadManager::new(&hub_config(), Box::new(hub.clone()), sink.clone())
            .with_sleeper(Box::new(sleeper.clone()));
        Harness {
            dir,
            hub,
            sink,
            sleeper,
            manager,
        }
    }

    fn url(remote_path: &str) -> String {
        format!("{ENDPOINT}/acme/clip/resolve/main/{remote_path}")
    }

    fn serve_required(hub: &FakeHub) {
        for name in ["config.json", "preprocessor_config.json", "tokenizer.json"] {
            hub.serve(url(name), FakeFile::new(b"{\"ok\":true}"));
        }
    }

    fn serve_all(hub: &FakeHub) {
        serve_required(hub);
        for name in [
            "tokenizer_config.json",
            "special_tokens_map.json",
            "merges.txt",
            "vocab.json",
        ] {
            hub.serve(url(name), FakeFile::new(b"data"));
        }
        hub.serve(url("onnx/model.onnx"), FakeFile::new(b"weights-weights"));
    }

    fn event_types(sink: &RecordingSink) -> Vec<String> {
        sink.events()
            .iter()
            .map(|e| serde_json::to_value(e).unwrap()["type"].as_str().unwrap().to_string())
            .collect()
    }

    fn install(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
    }

    #[tokio::test]
    async fn test_complete_directory_makes_no_requests() {
        let h = harness();
        install(
            h.dir.path(),
            &[
                "config.json",
                "preprocessor_config.json",
                "tokenizer.json",
                "model_quantized.onnx",
            ],
        );

        let ok = h.manager.ensure_complete(h.dir.path()).await.unwrap();

        assert!(ok);
        assert!(h.hub.calls().is_empty());
        assert_eq!(h.sink.events(), vec![DownloadEvent::Verify { ok: true }]);
    }

    #[tokio::test]
    async fn test_full_download() {
        let h = harness();
        serve_all(&h.hub);
        let model_dir = h.dir.path().join("model");

        let ok = h.manager.ensure_complete(&model_dir).await.unwrap();

        assert!(ok);
        assert_eq!(
            std::fs::read(model_dir.join("model.onnx")).unwrap(),
            b"weights-weights"
        );
        assert!(!model_dir.join("model_quantized.onnx").exists());

        let events = h.sink.events();
        assert_eq!(
            events[0],
            DownloadEvent::Start {
                model: "acme/clip".into(),
                model_dir: model_dir.display().to_string(),
                total_files: 9,
            }
        );
        assert_eq!(
            events[1],
            DownloadEvent::File {
                filename: "config.json".into(),
                current: 1,
                total: 9,
                attempt: 1,
                max_attempts: 5,
                completed: false,
            }
        );
        let types = event_types(&h.sink);
        assert_eq!(&types[types.len() - 2..], ["done", "verify"]);
        assert_eq!(events.last(), Some(&DownloadEvent::Verify { ok: true }));
        assert!(h.sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_missing_optional_files_are_skipped() {
        let h = harness();
        serve_required(&h.hub);
        h.hub.serve(url("onnx/model.onnx"), FakeFile::new(b"weights"));

        let ok = h.manager.ensure_complete(h.dir.path()).await.unwrap();

        assert!(ok);
        let missing: Vec<String> = h
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DownloadEvent::OptionalMissing { filename, .. } => Some(filename),
                _ => None,
            })
            .collect();
        assert_eq!(
            missing,
            vec![
                "tokenizer_config.json",
                "special_tokens_map.json",
                "merges.txt",
                "vocab.json"
            ]
        );
        // Not-found is permanent: no backoff.
        assert!(h.sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_file_aborts() {
        let h = harness();
        h.hub.serve(url("config.json"), FakeFile::new(b"{}"));

        let err = h.manager.ensure_complete(h.dir.path()).await.unwrap_err();

        assert!(matches!(
            err,
            DownloadError::RequiredMissing { ref filename } if filename == "preprocessor_config.json"
        ));
        assert!(!event_types(&h.sink).contains(&"done".to_string()));
    }

    #[tokio::test]
    async fn test_falls_back_to_second_weight_candidate() {
        let h = harness();
        serve_required(&h.hub);
        h.hub
            .serve(url("onnx/model_quantized.onnx"), FakeFile::new(b"int8"));

        let ok = h.manager.ensure_complete(h.dir.path()).await.unwrap();

        assert!(ok);
        assert!(h.sink.events().contains(&DownloadEvent::WeightMissing {
            filename: "model.onnx".into(),
            message: format!("{} not found on hub", url("onnx/model.onnx")),
        }));
        assert_eq!(
            std::fs::read(h.dir.path().join("model_quantized.onnx")).unwrap(),
            b"int8"
        );
    }

    #[tokio::test]
    async fn test_no_weights_is_an_error() {
        let h = harness();
        serve_required(&h.hub);

        let err = h.manager.ensure_complete(h.dir.path()).await.unwrap_err();

        assert!(matches!(err, DownloadError::NoWeights));
        assert_eq!(err.to_string(), "failed to download model weights");
    }

    #[tokio::test]
    async fn test_transient_failures_back_off_then_succeed() {
        let h = harness();
        serve_all(&h.hub);
        let mut flaky = FakeFile::new(b"{\"ok\":true}");
        flaky.fail_fetches = 2;
        h.hub.serve(url("config.json"), flaky);

        let ok = h.manager.ensure_complete(h.dir.path()).await.unwrap();

        assert!(ok);
        assert_eq!(
            h.sleeper.waits(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        let retries: Vec<(u32, u64)> = h
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DownloadEvent::Retry {
                    attempt,
                    next_wait_seconds,
                    ..
                } => Some((attempt, next_wait_seconds)),
                _ => None,
            })
            .collect();
        assert_eq!(retries, vec![(1, 2), (2, 4)]);
        assert!(h.sink.events().contains(&DownloadEvent::File {
            filename: "config.json".into(),
            current: 1,
            total: 9,
            attempt: 3,
            max_attempts: 5,
            completed: true,
        }));
    }

    #[tokio::test]
    async fn test_exhausted_attempts_on_required_file() {
        let h = harness();
        serve_all(&h.hub);
        let mut broken = FakeFile::new(b"{}");
        broken.fail_fetches = 10;
        h.hub.serve(url("config.json"), broken);

        let err = h.manager.ensure_complete(h.dir.path()).await.unwrap_err();

        assert!(matches!(err, DownloadError::RequiredFailed { .. }));
        assert_eq!(h.sleeper.waits().len(), 4);
        assert!(!h.dir.path().join("config.json.download").exists());
    }

    #[tokio::test]
    async fn test_exhausted_weight_tries_next_candidate() {
        let h = harness();
        serve_required(&h.hub);
        let mut broken = FakeFile::new(b"weights");
        broken.fail_fetches = 10;
        h.hub.serve(url("onnx/model.onnx"), broken);
        h.hub
            .serve(url("onnx/model_quantized.onnx"), FakeFile::new(b"int8"));

        let ok = h.manager.ensure_complete(h.dir.path()).await.unwrap();

        assert!(ok);
        assert!(event_types(&h.sink).contains(&"weight-failed".to_string()));
        assert!(h.dir.path().join("model_quantized.onnx").exists());
    }

    #[tokio::test]
    async fn test_interrupted_weight_resumes() {
        let h = harness();
        serve_required(&h.hub);
        let mut cut = FakeFile::new(b"0123456789");
        cut.cut_after = Some(6);
        h.hub.serve(url("onnx/model.onnx"), cut);

        let ok = h.manager.ensure_complete(h.dir.path()).await.unwrap();

        assert!(ok);
        assert_eq!(
            h.hub.fetch_offsets(&url("onnx/model.onnx")),
            vec![None, Some(6)]
        );
        assert_eq!(
            std::fs::read(h.dir.path().join("model.onnx")).unwrap(),
            b"0123456789"
        );
        assert_eq!(h.sleeper.waits(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_existing_files_are_not_downloaded_again() {
        let h = harness();
        serve_all(&h.hub);
        install(h.dir.path(), &["config.json", "model_quantized.onnx"]);

        let ok = h.manager.ensure_complete(h.dir.path()).await.unwrap();

        assert!(ok);
        assert!(h.hub.fetch_offsets(&url("config.json")).is_empty());
        assert!(h.hub.fetch_offsets(&url("onnx/model.onnx")).is_empty());
        assert!(h.sink.events().contains(&DownloadEvent::File {
            filename: "model_quantized.onnx".into(),
            current: 9,
            total: 9,
            attempt: 1,
            max_attempts: 5,
            completed: false,
        }));
    }
}
