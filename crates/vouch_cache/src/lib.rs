//! Local disk cache for remotely stored Vouch videos.
//!
//! Video files are too large to download on every playback or thumbnail
//! pass, so [`DiskVideoCache`] keeps recently used ones on local disk and
//! hands out paths to complete files.
//!
//! # Guarantees
//!
//! - **Complete files only**: Downloads land in a temp file and are renamed
//!   into place once fully written
//! - **Disk budget**: The sum of cached file sizes never exceeds
//!   `max_cache_size_bytes`; least recently used files are evicted first
//! - **Single flight**: Concurrent requests for the same key share one
//!   download and one result
//! - **No partial state on failure**: A failed download leaves neither an
//!   entry nor a file behind

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod entry;

pub use cache::{CacheResult, DiskVideoCache};
pub use config::{VideoCacheConfig, VideoCacheConfigBuilder};
pub use entry::{CacheEntry, CacheStats};

pub use vouch_error::{CacheError, CacheErrorKind};
