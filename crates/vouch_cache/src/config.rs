//! Video cache configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for [`DiskVideoCache`](crate::DiskVideoCache).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct VideoCacheConfig {
    /// Directory holding cached video files
    #[serde(default = "default_cache_dir")]
    cache_dir: PathBuf,

    /// Disk budget for cached files, in bytes
    #[serde(default = "default_max_cache_size_bytes")]
    max_cache_size_bytes: u64,
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("vouch-video-cache")
}

fn default_max_cache_size_bytes() -> u64 {
    1024 * 1024 * 1024 // 1 GiB
}

impl Default for VideoCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            max_cache_size_bytes: default_max_cache_size_bytes(),
        }
    }
}

impl VideoCacheConfig {
    /// Create a configuration for `cache_dir` with a byte budget.
    pub fn new(cache_dir: impl Into<PathBuf>, max_cache_size_bytes: u64) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_cache_size_bytes,
        }
    }
}
