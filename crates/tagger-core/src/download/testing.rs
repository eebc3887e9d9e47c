//! In-memory hub for exercising transfers without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::retry::Sleeper;
use super::transport::{ChunkReader, HubResponse, HubTransport, RemoteMetadata};
use crate::error::TransferError;

const FAKE_CHUNK: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Metadata(String),
    Fetch { url: String, offset: Option<u64> },
}

#[derive(Debug, Clone, Default)]
pub struct FakeFile {
    pub data: Vec<u8>,
    /// Fail this many fetches with a connection reset before serving.
    pub fail_fetches: u32,
    /// Serve only this many bytes on the next fetch, then reset.
    pub cut_after: Option<usize>,
    /// Answer ranged requests with the full body (200).
    pub ignore_range: bool,
    /// Answer ranged requests with 416.
    pub reject_range: bool,
    /// Report a size larger than the body actually served.
    pub advertised_size: Option<u64>,
}

impl FakeFile {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            ..Default::default()
        }
    }
}

#[derive(Default)]
pub struct FakeHub {
    files: Mutex<HashMap<String, FakeFile>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: impl Into<String>, file: FakeFile) {
        self.files.lock().unwrap().insert(url.into(), file);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_offsets(&self, url: &str) -> Vec<Option<u64>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch { url: u, offset } if u == url => Some(offset),
                _ => None,
            })
            .collect()
    }
}

struct FakeBody {
    chunks: VecDeque<Vec<u8>>,
    then_fail: bool,
}

impl FakeBody {
    fn new(data: &[u8], then_fail: bool) -> Self {
        Self {
            chunks: data.chunks(FAKE_CHUNK).map(|c| c.to_vec()).collect(),
            then_fail,
        }
    }
}

#[async_trait]
impl ChunkReader for FakeBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransferError> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None if self.then_fail => {
                self.then_fail = false;
                Err(TransferError::Network("connection reset mid-body".into()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl HubTransport for FakeHub {
    async fn metadata(&self, url: &str) -> Result<RemoteMetadata, TransferError> {
        self.calls.lock().unwrap().push(Call::Metadata(url.to_string()));
        let files = self.files.lock().unwrap();
        let file = files.get(url).ok_or_else(|| TransferError::NotFound {
            url: url.to_string(),
        })?;
        Ok(RemoteMetadata {
            size: Some(file.advertised_size.unwrap_or(file.data.len() as u64)),
        })
    }

    async fn fetch(&self, url: &str, offset: Option<u64>) -> Result<HubResponse, TransferError> {
        self.calls.lock().unwrap().push(Call::Fetch {
            url: url.to_string(),
            offset,
        });
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(url).ok_or_else(|| TransferError::NotFound {
            url: url.to_string(),
        })?;

        if file.fail_fetches > 0 {
            file.fail_fetches -= 1;
            return Err(TransferError::Network("connection reset".into()));
        }

        let (body, partial) = match offset {
            Some(_) if file.reject_range => {
                return Err(TransferError::RangeNotSatisfiable {
                    url: url.to_string(),
                })
            }
            Some(_) if file.ignore_range => (file.data.clone(), false),
            Some(start) if start >= file.data.len() as u64 => {
                return Err(TransferError::RangeNotSatisfiable {
                    url: url.to_string(),
                })
            }
            Some(start) => (file.data[start as usize..].to_vec(), true),
            None => (file.data.clone(), false),
        };

        let (body, then_fail) = match file.cut_after.take() {
            Some(cut) => (body[..cut.min(body.len())].to_vec(), true),
            None => (body, false),
        };

        Ok(HubResponse {
            partial,
            content_length: Some(body.len() as u64),
            body: Box::new(FakeBody::new(&body, then_fail)),
        })
    }
}

/// Records requested waits instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

#[async_trait]
impl<T: Sleeper + ?Sized> Sleeper for std::sync::Arc<T> {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

#[async_trait]
impl<T: HubTransport + ?Sized> HubTransport for std::sync::Arc<T> {
    async fn metadata(&self, url: &str) -> Result<RemoteMetadata, TransferError> {
        (**self).metadata(url).await
    }

    async fn fetch(&self, url: &str, offset: Option<u64>) -> Result<HubResponse, TransferError> {
        (**self).fetch(url, offset).await
    }
}
