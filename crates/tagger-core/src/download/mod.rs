//! Model artifact download.
//!
//! [`AssetDownloadManager`] makes a model directory complete by fetching the
//! [`Manifest`] targets one after another over resumable HTTP range requests,
//! retrying transient failures with capped exponential backoff and reporting
//! every step as a [`DownloadEvent`].

pub mod events;
pub mod manager;
pub mod manifest;
pub mod progress;
pub mod retry;
pub mod transfer;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{DownloadEvent, EventSink, JsonLinesSink, RecordingSink};
pub use manager::AssetDownloadManager;
pub use manifest::{is_present, DownloadTarget, Manifest, TargetKind};
pub use retry::{backoff_delay, RetryDecision, RetryState, Sleeper, TokioSleeper};
pub use transfer::{Transfer, TransferOutcome, TransferPhase};
pub use transport::{HttpTransport, HubResponse, HubTransport, RemoteMetadata};
