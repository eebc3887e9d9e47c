//! `file-progress` reporting with rate limiting.

use std::time::{Duration, Instant};

use super::events::{DownloadEvent, EventSink};

/// Minimum wall time between two progress events for the same file.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Lets a progress report through at most once per interval.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether a report at `now` should be emitted. Records it if so.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(PROGRESS_INTERVAL)
    }
}

/// Emits `file-progress` events for one file transfer.
pub struct ProgressReporter<'a> {
    sink: &'a dyn EventSink,
    filename: &'a str,
    step_index: usize,
    total_steps: usize,
    throttle: ProgressThrottle,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(
        sink: &'a dyn EventSink,
        filename: &'a str,
        step_index: usize,
        total_steps: usize,
    ) -> Self {
        Self {
            sink,
            filename,
            step_index,
            total_steps,
            throttle: ProgressThrottle::default(),
        }
    }

    /// Report bytes so far, unless a report went out less than 200 ms ago.
    pub fn report(&mut self, current_bytes: u64, total_bytes: Option<u64>) {
        if self.throttle.ready(Instant::now()) {
            self.emit(current_bytes, total_bytes);
        }
    }

    /// Final report for the transfer, always emitted.
    pub fn finish(&mut self, current_bytes: u64, total_bytes: Option<u64>) {
        self.emit(current_bytes, total_bytes);
    }

    fn emit(&self, current_bytes: u64, total_bytes: Option<u64>) {
        self.sink.emit(&DownloadEvent::FileProgress {
            filename: self.filename.to_string(),
            current_bytes,
            total_bytes,
            step_index: self.step_index,
            total_steps: self.total_steps,
        });
    }
}
