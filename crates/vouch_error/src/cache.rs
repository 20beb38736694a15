//! Video cache error types.

use crate::{StorageError, StorageErrorKind};

/// Kinds of cache errors.
///
/// Every variant is cheap to clone: a single failed download is reported to
/// every caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CacheErrorKind {
    /// Downloaded content was empty, or the stream/write broke partway
    #[display("Download integrity error: {}", _0)]
    DownloadIntegrity(String),
    /// Eviction could not free enough space for the object
    #[display("Cannot fit {} bytes into a {} byte cache", required, max)]
    EvictionExhausted {
        /// Size of the object being admitted
        required: u64,
        /// Configured cache budget
        max: u64,
    },
    /// Remote store failed after its retries
    #[display("{}", _0)]
    Storage(StorageErrorKind),
    /// Local filesystem operation failed
    #[display("Cache I/O error: {}", _0)]
    Io(String),
    /// The key was invalidated while its download was running
    #[display("Cache entry for {} was invalidated during download", _0)]
    Invalidated(String),
    /// The background download task did not run to completion
    #[display("Download task failed: {}", _0)]
    TaskFailed(String),
}

/// Cache error with location tracking.
///
/// # Examples
///
/// ```
/// use vouch_error::{CacheError, CacheErrorKind};
///
/// let err = CacheError::new(CacheErrorKind::EvictionExhausted { required: 20, max: 10 });
/// assert!(format!("{}", err).contains("Cannot fit 20 bytes"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Cache Error: {} at line {} in {}", kind, line, file)]
pub struct CacheError {
    /// The kind of error that occurred
    pub kind: CacheErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CacheError {
    /// Create a new cache error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CacheErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &CacheErrorKind {
        &self.kind
    }
}

impl From<StorageError> for CacheError {
    #[track_caller]
    fn from(err: StorageError) -> Self {
        Self::new(CacheErrorKind::Storage(err.kind))
    }
}
