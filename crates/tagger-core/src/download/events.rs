//! Progress events emitted by `--download-model`.
//!
//! Serialized as `{"type": "<kebab-case>", ...camelCase fields}`, one per line.

use std::io::Write;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::output::JsonLinesWriter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DownloadEvent {
    #[serde(rename_all = "camelCase")]
    Start {
        model: String,
        model_dir: String,
        total_files: usize,
    },
    /// Announces an attempt; repeated with `completed: true` once the file lands.
    #[serde(rename_all = "camelCase")]
    File {
        filename: String,
        current: usize,
        total: usize,
        attempt: u32,
        max_attempts: u32,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        completed: bool,
    },
    #[serde(rename_all = "camelCase")]
    FileProgress {
        filename: String,
        current_bytes: u64,
        total_bytes: Option<u64>,
        step_index: usize,
        total_steps: usize,
    },
    #[serde(rename_all = "camelCase")]
    Retry {
        filename: String,
        attempt: u32,
        next_wait_seconds: u64,
        message: String,
    },
    OptionalMissing {
        filename: String,
        message: String,
    },
    WeightMissing {
        filename: String,
        message: String,
    },
    WeightFailed {
        filename: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        model_dir: String,
    },
    Verify {
        ok: bool,
    },
    Error {
        message: String,
    },
}

/// Receives events in the order the manager produces them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DownloadEvent);
}

/// Writes each event as a JSON line and flushes it immediately.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<JsonLinesWriter<W>>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(JsonLinesWriter::new(writer)),
        }
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &DownloadEvent) {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writer.write(event) {
            tracing::warn!("Failed to write progress event: {e}");
        }
    }
}

/// Keeps events in memory, for embedding callers and tests.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DownloadEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<DownloadEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &DownloadEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
