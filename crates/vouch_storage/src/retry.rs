//! Retry wrapper around a [`BlobBackend`].

use crate::normalize::{normalize, normalize_unit};
use crate::{BlobBackend, ByteStream, StorageResult};
use bytes::Bytes;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, error, warn};
use vouch_error::{StorageError, StorageErrorKind, StorageOperation};

/// How often, and how patiently, a failed storage call is retried.
///
/// After failed attempt `n` the store waits `n * base_delay` before trying
/// again (linear backoff). No wait follows the final attempt.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(default)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first
    #[serde(default = "default_max_retries")]
    max_retries: u32,

    /// Backoff unit in milliseconds
    #[serde(default = "default_base_delay_ms")]
    base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit limits.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay_ms: base_delay.as_millis() as u64,
        }
    }

    /// Number of attempts actually made; never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Backoff unit.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Waits between consecutive attempts: `base, 2 * base, ...`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let base = self.base_delay();
        (1..self.attempts()).map(move |attempt| base * attempt)
    }
}

/// A blob store client that retries every operation and hides backend
/// response shapes.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vouch_storage::{FileSystemBackend, RetryPolicy, RetryingBlobStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = FileSystemBackend::new("/var/lib/vouch/objects")?;
/// let store = RetryingBlobStore::new(Arc::new(backend), RetryPolicy::default());
///
/// store.upload("shared/uploads/1-clip.mp4", b"....".to_vec()).await?;
/// assert!(store.exists("shared/uploads/1-clip.mp4").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RetryingBlobStore {
    backend: Arc<dyn BlobBackend>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryingBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingBlobStore")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetryingBlobStore {
    /// Wrap a backend with a retry policy.
    pub fn new(backend: Arc<dyn BlobBackend>, policy: RetryPolicy) -> Self {
        debug!(
            backend = backend.name(),
            max_retries = policy.max_retries,
            base_delay_ms = policy.base_delay_ms,
            "Creating retrying blob store"
        );
        Self { backend, policy }
    }

    /// The active retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Store `data` under `key`.
    #[tracing::instrument(skip(self, data), fields(backend = self.backend.name()))]
    pub async fn upload(&self, key: &str, data: impl Into<Bytes>) -> StorageResult<()> {
        validate_key(key)?;
        let data = data.into();
        self.run(StorageOperation::Upload, key, || {
            let data = data.clone();
            async move { normalize_unit(self.backend.upload(key, data).await) }
        })
        .await
    }

    /// Fetch a whole object into memory.
    ///
    /// Prefer [`download_stream`](Self::download_stream) for video.
    #[tracing::instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn download_bytes(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        self.run(StorageOperation::DownloadBytes, key, || async move {
            normalize(self.backend.download_bytes(key).await)
        })
        .await
    }

    /// Open a streaming download.
    ///
    /// Only establishing the stream is retried; an error yielded by the
    /// stream itself is the caller's to handle.
    #[tracing::instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn download_stream(&self, key: &str) -> StorageResult<ByteStream> {
        validate_key(key)?;
        self.run(StorageOperation::DownloadStream, key, || async move {
            normalize(self.backend.download_stream(key).await)
        })
        .await
    }

    /// Delete an object. Missing objects are not an error.
    #[tracing::instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.run(StorageOperation::Delete, key, || async move {
            normalize_unit(self.backend.delete(key).await)
        })
        .await
    }

    /// Check whether an object exists.
    #[tracing::instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        self.run(StorageOperation::Exists, key, || async move {
            normalize(self.backend.exists(key).await)
        })
        .await
    }

    /// List keys starting with `prefix`.
    #[tracing::instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.run(StorageOperation::List, prefix, || async move {
            normalize(self.backend.list(prefix).await)
        })
        .await
    }

    async fn run<T, F, Fut>(
        &self,
        operation: StorageOperation,
        key: &str,
        mut call: F,
    ) -> StorageResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let max_attempts = self.policy.attempts();
        let attempt = AtomicU32::new(0);

        let outcome = Retry::spawn(self.policy.delays(), || {
            let current = attempt.fetch_add(1, Ordering::SeqCst) + 1;
            let call = call();
            async move {
                call.await.map_err(|cause| {
                    warn!(
                        %operation,
                        key,
                        attempt = current,
                        max_attempts,
                        error = %cause,
                        "Storage attempt failed"
                    );
                    RetryError::Transient {
                        err: cause,
                        retry_after: None,
                    }
                })
            }
        })
        .await;

        outcome.map_err(|cause| {
            let attempts = attempt.load(Ordering::SeqCst);
            error!(%operation, key, attempts, error = %cause, "Storage operation exhausted retries");
            StorageError::new(StorageErrorKind::Operation {
                operation,
                attempts,
                cause,
            })
        })
    }
}

fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::new(StorageErrorKind::InvalidKey(
            "empty key".to_string(),
        )));
    }
    Ok(())
}
