//! Storage error types.

/// Remote blob store operations, named for diagnostics.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum StorageOperation {
    /// Store an object
    Upload,
    /// Fetch a whole object into memory
    DownloadBytes,
    /// Open a streaming download
    DownloadStream,
    /// Remove an object
    Delete,
    /// Check whether an object exists
    Exists,
    /// List keys under a prefix
    List,
}

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// A remote operation failed on every attempt
    #[display("{} failed after {} attempt(s): {}", operation, attempts, cause)]
    Operation {
        /// Operation that failed
        operation: StorageOperation,
        /// Number of attempts made
        attempts: u32,
        /// Last underlying cause
        cause: String,
    },
    /// Object key is empty or escapes the store namespace
    #[display("Invalid object key: {}", _0)]
    InvalidKey(String),
    /// Object not found at the specified key
    #[display("Object not found: {}", _0)]
    NotFound(String),
    /// Failed to create storage directory
    #[display("Failed to create storage directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write file
    #[display("Failed to write file: {}", _0)]
    FileWrite(String),
    /// Failed to read file
    #[display("Failed to read file: {}", _0)]
    FileRead(String),
    /// Backend returned a response that could not be interpreted
    #[display("Backend error: {}", _0)]
    Backend(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use vouch_error::{StorageError, StorageErrorKind, StorageOperation};
///
/// let err = StorageError::new(StorageErrorKind::Operation {
///     operation: StorageOperation::Upload,
///     attempts: 3,
///     cause: "connection reset".to_string(),
/// });
/// assert!(format!("{}", err).contains("upload failed after 3 attempt(s)"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StorageErrorKind {
        &self.kind
    }
}
