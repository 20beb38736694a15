//! Vouch - media caching and storage layer
//!
//! Vouch keeps user-uploaded media in a remote object store and serves
//! videos from a bounded local disk cache. It provides:
//!
//! - **Retrying blob store**: bounded retries with linear backoff over
//!   filesystem, HTTP or in-memory backends
//! - **Disk video cache**: LRU eviction under a byte budget, one download per
//!   key no matter how many concurrent callers
//! - **Thumbnails**: a still frame picked from several offsets so blank
//!   intros don't become the preview
//! - **Ingest**: generated object keys, public URLs and thumbnails for
//!   uploaded buffers
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vouch::{MediaService, VouchConfig, telemetry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     telemetry::init_console_telemetry()?;
//!
//!     let config = VouchConfig::load()?;
//!     let service = MediaService::from_config(&config).await?;
//!
//!     println!("{:?}", service.cache_stats().await);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `vouch_error` - Error types
//! - `vouch_storage` - Object keys, backends and `RetryingBlobStore`
//! - `vouch_cache` - `DiskVideoCache`
//! - `vouch_media` - `ThumbnailExtractor` and `StorageIngestPipeline`
//!
//! This crate re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod service;
pub mod telemetry;

pub use config::{BackendKind, StorageConfig, VouchConfig};
pub use service::MediaService;

pub use vouch_cache::*;
pub use vouch_error::*;
pub use vouch_media::*;
pub use vouch_storage::*;
