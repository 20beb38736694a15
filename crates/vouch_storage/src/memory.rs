//! In-memory object store.
//!
//! Keeps objects in a map and records every call, which makes it the
//! backend of choice for tests and for running the media layer without a
//! remote service. Failures can be scripted per operation in either of the
//! shapes a real backend produces.

use crate::{BackendReply, BackendResult, BlobBackend, ByteStream};
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::sync::Mutex;
use vouch_error::{StorageError, StorageErrorKind, StorageOperation};

/// Chunk size used when streaming an object.
const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// How a scripted failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureShape {
    /// The call itself errors.
    Error,
    /// The call returns an envelope with `ok == false`.
    Structured,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, Bytes>,
    calls: HashMap<StorageOperation, u32>,
    failures: HashMap<StorageOperation, (u32, FailureShape)>,
    broken_streams: HashMap<String, usize>,
    latency: Option<Duration>,
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting a call.
    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.state.lock().await.objects.insert(key.into(), data.into());
    }

    /// Read an object without counting a call.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.state.lock().await.objects.get(key).cloned()
    }

    /// Number of times `operation` has been invoked.
    pub async fn call_count(&self, operation: StorageOperation) -> u32 {
        self.state
            .lock()
            .await
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Total calls across every operation.
    pub async fn total_calls(&self) -> u32 {
        let state = self.state.lock().await;
        StorageOperation::iter()
            .map(|op| state.calls.get(&op).copied().unwrap_or(0))
            .sum()
    }

    /// Make the next `times` calls of `operation` fail.
    pub async fn fail_next(&self, operation: StorageOperation, times: u32, shape: FailureShape) {
        self.state
            .lock()
            .await
            .failures
            .insert(operation, (times, shape));
    }

    /// Make streamed downloads of `key` break after `after_bytes` bytes.
    pub async fn break_stream(&self, key: impl Into<String>, after_bytes: usize) {
        self.state
            .lock()
            .await
            .broken_streams
            .insert(key.into(), after_bytes);
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    /// Count the call, apply latency, and decide whether it fails.
    async fn begin(&self, operation: StorageOperation) -> Option<FailureShape> {
        let (latency, failure) = {
            let mut state = self.state.lock().await;
            *state.calls.entry(operation).or_insert(0) += 1;

            let failure = match state.failures.get_mut(&operation) {
                Some((remaining, shape)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(*shape)
                }
                _ => None,
            };
            (state.latency, failure)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        failure
    }

    fn scripted<T>(operation: StorageOperation, shape: FailureShape) -> BackendResult<T> {
        let message = format!("scripted {} failure", operation);
        match shape {
            FailureShape::Error => Err(StorageError::new(StorageErrorKind::Backend(message))),
            FailureShape::Structured => Ok(BackendReply::failed(message)),
        }
    }

    async fn object(&self, key: &str) -> Result<Bytes, StorageError> {
        self.state
            .lock()
            .await
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(key.to_string())))
    }
}

#[async_trait::async_trait]
impl BlobBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(&self, key: &str, data: Bytes) -> BackendResult<()> {
        if let Some(shape) = self.begin(StorageOperation::Upload).await {
            return Self::scripted(StorageOperation::Upload, shape);
        }
        self.state
            .lock()
            .await
            .objects
            .insert(key.to_string(), data);
        Ok(BackendReply::Structured {
            ok: true,
            value: None,
            error: None,
        })
    }

    async fn download_bytes(&self, key: &str) -> BackendResult<Bytes> {
        if let Some(shape) = self.begin(StorageOperation::DownloadBytes).await {
            return Self::scripted(StorageOperation::DownloadBytes, shape);
        }
        Ok(BackendReply::ok(self.object(key).await?))
    }

    async fn download_stream(&self, key: &str) -> BackendResult<ByteStream> {
        if let Some(shape) = self.begin(StorageOperation::DownloadStream).await {
            return Self::scripted(StorageOperation::DownloadStream, shape);
        }
        let data = self.object(key).await?;
        let break_after = self.state.lock().await.broken_streams.get(key).copied();

        let mut chunks: Vec<std::io::Result<Bytes>> = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + STREAM_CHUNK_BYTES).min(data.len());
            if let Some(limit) = break_after
                && end > limit
            {
                if limit > offset {
                    chunks.push(Ok(data.slice(offset..limit)));
                }
                chunks.push(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "stream interrupted",
                )));
                break;
            }
            chunks.push(Ok(data.slice(offset..end)));
            offset = end;
        }

        Ok(BackendReply::Value(futures::stream::iter(chunks).boxed()))
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        if let Some(shape) = self.begin(StorageOperation::Delete).await {
            return Self::scripted(StorageOperation::Delete, shape);
        }
        self.state.lock().await.objects.remove(key);
        Ok(BackendReply::Value(()))
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        if let Some(shape) = self.begin(StorageOperation::Exists).await {
            return Self::scripted(StorageOperation::Exists, shape);
        }
        let exists = self.state.lock().await.objects.contains_key(key);
        Ok(BackendReply::Value(exists))
    }

    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>> {
        if let Some(shape) = self.begin(StorageOperation::List).await {
            return Self::scripted(StorageOperation::List, shape);
        }
        let keys = self
            .state
            .lock()
            .await
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        Ok(BackendReply::ok(keys))
    }
}
