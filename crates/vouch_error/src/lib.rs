//! Error types for the Vouch media layer.
//!
//! This crate provides the foundation error types shared by the storage,
//! cache and media crates.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use vouch_error::{StorageError, StorageErrorKind, VouchResult};
//!
//! fn lookup(key: &str) -> VouchResult<Vec<u8>> {
//!     Err(StorageError::new(StorageErrorKind::NotFound(key.to_string())))?
//! }
//!
//! assert!(lookup("shared/uploads/1-clip.mp4").is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod media;
mod storage;

pub use cache::{CacheError, CacheErrorKind};
pub use config::ConfigError;
pub use error::{VouchError, VouchErrorKind, VouchResult};
pub use media::{MediaError, MediaErrorKind};
pub use storage::{StorageError, StorageErrorKind, StorageOperation};
