//! Network access to the hub.
//!
//! The manager only talks to [`HubTransport`], so transfers can be exercised
//! against an in-memory hub. [`HttpTransport`] is the `reqwest` implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;

use crate::config::HubConfig;
use crate::error::{DownloadError, TransferError};

/// Header the hub uses to report the real size of LFS-backed files.
const LINKED_SIZE_HEADER: &str = "x-linked-size";

/// Result of the size lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteMetadata {
    pub size: Option<u64>,
}

/// An open response body, read chunk by chunk.
#[async_trait]
pub trait ChunkReader: Send {
    /// Next piece of the body, or `None` at the end.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransferError>;
}

/// A successful (2xx) reply to a file request.
pub struct HubResponse {
    /// True for `206 Partial Content`, i.e. the range was honored.
    pub partial: bool,
    /// Length of this body (not of the whole file when partial).
    pub content_length: Option<u64>,
    pub body: Box<dyn ChunkReader>,
}

#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Look up a file's size without downloading it.
    async fn metadata(&self, url: &str) -> Result<RemoteMetadata, TransferError>;

    /// Request a file, optionally starting at byte `offset`.
    ///
    /// Maps 404 to [`TransferError::NotFound`] and 416 to
    /// [`TransferError::RangeNotSatisfiable`].
    async fn fetch(&self, url: &str, offset: Option<u64>) -> Result<HubResponse, TransferError>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    metadata_timeout: Duration,
}

impl HttpTransport {
    pub fn new(hub: &HubConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tagger/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(hub.metadata_timeout())
            .read_timeout(hub.download_timeout())
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;
        Ok(Self {
            client,
            metadata_timeout: hub.metadata_timeout(),
        })
    }
}

fn classify(error: reqwest::Error) -> TransferError {
    if error.is_timeout() {
        TransferError::Timeout(error.to_string())
    } else {
        TransferError::Network(error.to_string())
    }
}

fn check_status(url: &str, status: StatusCode) -> Result<(), TransferError> {
    match status {
        StatusCode::NOT_FOUND => Err(TransferError::NotFound {
            url: url.to_string(),
        }),
        StatusCode::RANGE_NOT_SATISFIABLE => Err(TransferError::RangeNotSatisfiable {
            url: url.to_string(),
        }),
        s if !s.is_success() => Err(TransferError::Status {
            url: url.to_string(),
            status: s.as_u16(),
        }),
        _ => Ok(()),
    }
}

fn header_u64(
    headers: &reqwest::header::HeaderMap,
    name: impl reqwest::header::AsHeaderName,
) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl HubTransport for HttpTransport {
    async fn metadata(&self, url: &str) -> Result<RemoteMetadata, TransferError> {
        let response = self
            .client
            .head(url)
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(classify)?;
        check_status(url, response.status())?;

        let headers = response.headers();
        let size = header_u64(headers, LINKED_SIZE_HEADER)
            .or_else(|| header_u64(headers, CONTENT_LENGTH));
        Ok(RemoteMetadata { size })
    }

    async fn fetch(&self, url: &str, offset: Option<u64>) -> Result<HubResponse, TransferError> {
        let mut request = self.client.get(url);
        if let Some(offset) = offset {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        check_status(url, status)?;

        Ok(HubResponse {
            partial: status == StatusCode::PARTIAL_CONTENT,
            content_length: response.content_length(),
            body: Box::new(StreamBody {
                stream: Box::pin(response.bytes_stream()),
            }),
        })
    }
}

struct StreamBody<S> {
    stream: S,
}

#[async_trait]
impl<S, B> ChunkReader for StreamBody<S>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
{
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransferError> {
        match self.stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk.as_ref().to_vec())),
            Some(Err(e)) => Err(classify(e)),
            None => Ok(None),
        }
    }
}
