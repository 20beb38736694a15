//! Remote blob store backend trait.

use bytes::Bytes;
use futures::stream::BoxStream;
use vouch_error::StorageError;

/// A stream of object bytes.
///
/// Errors yielded by the stream are transfer failures after the download
/// was established (connection drop, truncated read).
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// The shape a backend answered with.
///
/// Object store clients are inconsistent: some calls hand back a raw value,
/// others wrap it in an `{ ok, value, error }` envelope. Backends report
/// whichever shape they got and [`RetryingBlobStore`](crate::RetryingBlobStore)
/// normalizes it; failures signalled by `Err` are the third shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendReply<T> {
    /// A plain value; the call succeeded.
    Value(T),
    /// An envelope whose `ok` flag decides success.
    Structured {
        /// Success flag reported by the backend
        ok: bool,
        /// Payload, present on success for calls that return one
        value: Option<T>,
        /// Backend-provided failure description
        error: Option<String>,
    },
}

impl<T> BackendReply<T> {
    /// A successful envelope carrying `value`.
    pub fn ok(value: T) -> Self {
        Self::Structured {
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    /// A failed envelope with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Structured {
            ok: false,
            value: None,
            error: Some(message.into()),
        }
    }
}

/// Result returned by every backend call.
pub type BackendResult<T> = Result<BackendReply<T>, StorageError>;

/// Operations a remote object store must support.
///
/// Implementations do not retry; wrap them in
/// [`RetryingBlobStore`](crate::RetryingBlobStore).
#[async_trait::async_trait]
pub trait BlobBackend: Send + Sync {
    /// Backend name for logging (e.g., "filesystem", "http").
    fn name(&self) -> &'static str;

    /// Store `data` under `key`, replacing any existing object.
    async fn upload(&self, key: &str, data: Bytes) -> BackendResult<()>;

    /// Fetch a whole object into memory.
    async fn download_bytes(&self, key: &str) -> BackendResult<Bytes>;

    /// Open a streaming download of an object.
    async fn download_stream(&self, key: &str) -> BackendResult<ByteStream>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> BackendResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> BackendResult<bool>;

    /// List keys starting with `prefix`.
    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>>;
}
