//! One resumable file transfer.
//!
//! Bytes land in `<final>.download` and are renamed into place only once the
//! whole file has arrived. A partial temp file left behind by a failed attempt
//! is continued with an HTTP range request on the next attempt.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use super::progress::ProgressReporter;
use super::transport::{HubResponse, HubTransport};
use crate::error::TransferError;

/// Write buffer size; bytes are flushed to the temp file in blocks this large.
pub const CHUNK_SIZE: usize = 1024 * 1024;

const TEMP_SUFFIX: &str = "download";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPhase {
    NotStarted,
    InProgress { bytes_written: u64 },
    Completed,
    Failed(String),
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum TransferOutcome {
    Completed { bytes: u64 },
    /// The hub has no such file. Never worth retrying.
    NotFound(String),
    Failed(TransferError),
}

#[derive(Debug)]
pub struct Transfer {
    pub url: String,
    pub temp_path: PathBuf,
    pub final_path: PathBuf,
    pub total_bytes: Option<u64>,
    pub attempt: u32,
    phase: TransferPhase,
}

/// `<final>.download`
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(".");
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

async fn existing_len(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .unwrap_or(0)
}

impl Transfer {
    pub fn new(url: String, final_path: PathBuf) -> Self {
        Self {
            url,
            temp_path: temp_path_for(&final_path),
            final_path,
            total_bytes: None,
            attempt: 1,
            phase: TransferPhase::NotStarted,
        }
    }

    pub fn phase(&self) -> &TransferPhase {
        &self.phase
    }

    /// Make one attempt at fetching the file.
    pub async fn run(
        &mut self,
        transport: &dyn HubTransport,
        progress: &mut ProgressReporter<'_>,
    ) -> TransferOutcome {
        match self.attempt_once(transport, progress).await {
            Ok(bytes) => {
                self.phase = TransferPhase::Completed;
                TransferOutcome::Completed { bytes }
            }
            Err(e @ TransferError::NotFound { .. }) => {
                self.phase = TransferPhase::Failed(e.to_string());
                TransferOutcome::NotFound(e.to_string())
            }
            Err(e) => {
                tracing::debug!(
                    "Attempt {} for {} failed: {e}",
                    self.attempt,
                    self.final_path.display()
                );
                self.phase = TransferPhase::Failed(e.to_string());
                TransferOutcome::Failed(e)
            }
        }
    }

    /// Remove the temp file after an unrecoverable failure.
    pub async fn discard(&mut self) {
        match tokio::fs::remove_file(&self.temp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove {}: {e}",
                self.temp_path.display()
            ),
        }
    }

    async fn attempt_once(
        &mut self,
        transport: &dyn HubTransport,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<u64, TransferError> {
        if self.total_bytes.is_none() {
            match transport.metadata(&self.url).await {
                Ok(meta) => self.total_bytes = meta.size,
                Err(e @ TransferError::NotFound { .. }) => return Err(e),
                Err(e) => tracing::debug!("Size lookup for {} failed: {e}", self.url),
            }
        }

        let existing = existing_len(&self.temp_path).await;
        let offset = (existing > 0).then_some(existing);
        let (response, start) = self.open(transport, offset).await?;

        let mut file = if start > 0 {
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(&self.temp_path)
                .await?
        } else {
            tokio::fs::File::create(&self.temp_path).await?
        };

        let expected = self
            .total_bytes
            .or_else(|| response.content_length.map(|len| start + len));
        let mut body = response.body;
        let mut written = start;
        let mut received = start;
        let mut buffer: Vec<u8> = Vec::with_capacity(CHUNK_SIZE);
        self.phase = TransferPhase::InProgress {
            bytes_written: written,
        };

        loop {
            let chunk = match body.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    // Keep what already arrived so the next attempt resumes after it.
                    if !buffer.is_empty() {
                        file.write_all(&buffer).await?;
                        written += buffer.len() as u64;
                    }
                    file.flush().await?;
                    self.phase = TransferPhase::InProgress {
                        bytes_written: written,
                    };
                    return Err(e);
                }
            };

            received += chunk.len() as u64;
            buffer.extend_from_slice(&chunk);
            if buffer.len() >= CHUNK_SIZE {
                file.write_all(&buffer).await?;
                file.flush().await?;
                written += buffer.len() as u64;
                buffer.clear();
                self.phase = TransferPhase::InProgress {
                    bytes_written: written,
                };
            }
            progress.report(received, expected);
        }

        if !buffer.is_empty() {
            file.write_all(&buffer).await?;
            written += buffer.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        self.phase = TransferPhase::InProgress {
            bytes_written: written,
        };

        if let Some(expected) = expected {
            if written != expected {
                return Err(TransferError::Incomplete {
                    expected,
                    actual: written,
                });
            }
        }

        tokio::fs::rename(&self.temp_path, &self.final_path).await?;
        progress.finish(written, expected);
        Ok(written)
    }

    /// Issue the request, returning the response and the byte offset its body
    /// starts at.
    async fn open(
        &self,
        transport: &dyn HubTransport,
        offset: Option<u64>,
    ) -> Result<(HubResponse, u64), TransferError> {
        let Some(offset) = offset else {
            return Ok((transport.fetch(&self.url, None).await?, 0));
        };

        match transport.fetch(&self.url, Some(offset)).await {
            Ok(response) if response.partial => {
                tracing::debug!("Resuming {} at byte {offset}", self.url);
                Ok((response, offset))
            }
            Ok(response) => {
                tracing::debug!("Range ignored for {}, restarting", self.url);
                Ok((response, 0))
            }
            Err(TransferError::RangeNotSatisfiable { .. }) => {
                tracing::debug!("Range rejected for {}, refetching whole file", self.url);
                tokio::fs::remove_file(&self.temp_path).await?;
                Ok((transport.fetch(&self.url, None).await?, 0))
            }
            Err(e) => Err(e),
        }
    }
}
