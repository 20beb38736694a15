//! Media ingest error types.

use crate::{StorageError, StorageErrorKind};

/// Kinds of media ingest errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum MediaErrorKind {
    /// Upload carried no bytes
    #[display("Refusing to store empty payload for {}", _0)]
    EmptyPayload(String),
    /// Scratch file handling or process spawn failed
    #[display("Media I/O error: {}", _0)]
    Io(String),
    /// The frame grabber ran but produced no frame
    #[display("Frame extraction failed: {}", _0)]
    FrameExtraction(String),
    /// Remote store failed after its retries
    #[display("{}", _0)]
    Storage(StorageErrorKind),
}

/// Media error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Media Error: {} at line {} in {}", kind, line, file)]
pub struct MediaError {
    /// The kind of error that occurred
    pub kind: MediaErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl MediaError {
    /// Create a new media error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: MediaErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MediaErrorKind {
        &self.kind
    }
}

impl From<StorageError> for MediaError {
    #[track_caller]
    fn from(err: StorageError) -> Self {
        Self::new(MediaErrorKind::Storage(err.kind))
    }
}
