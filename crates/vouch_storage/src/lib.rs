//! Remote blob storage for Vouch media.
//!
//! This crate wraps a remote object store behind one retrying client so the
//! cache and ingest layers never deal with flaky networks or backend quirks
//! directly.
//!
//! # Features
//!
//! - **Bounded retries**: Every operation is attempted up to
//!   `max_retries` times with linear backoff
//! - **Normalized results**: Raw values, `{ok, value}` envelopes and thrown
//!   errors all become one [`StorageResult`]
//! - **Pluggable backends**: Filesystem, HTTP and in-memory implementations
//!   of [`BlobBackend`]
//! - **Namespaced keys**: [`ObjectKey`] builds upload keys and derives
//!   thumbnail keys
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vouch_storage::{MemoryBackend, RetryPolicy, RetryingBlobStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RetryingBlobStore::new(Arc::new(MemoryBackend::new()), RetryPolicy::default());
//!
//! store.upload("shared/uploads/1-clip.mp4", vec![0u8; 1024]).await?;
//! let data = store.download_bytes("shared/uploads/1-clip.mp4").await?;
//! assert_eq!(data.len(), 1024);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod filesystem;
mod http;
mod key;
mod memory;
mod normalize;
mod retry;

pub use backend::{BackendReply, BackendResult, BlobBackend, ByteStream};
pub use filesystem::FileSystemBackend;
pub use http::HttpBlobBackend;
pub use key::{ObjectKey, THUMBNAIL_EXTENSION, thumbnail_file_name};
pub use memory::{FailureShape, MemoryBackend};
pub use normalize::{normalize, normalize_unit};
pub use retry::{RetryPolicy, RetryPolicyBuilder, RetryingBlobStore};

pub use vouch_error::{StorageError, StorageErrorKind, StorageOperation};

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
