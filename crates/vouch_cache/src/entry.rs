//! Cache entries and statistics.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::Serialize;
use std::path::PathBuf;

/// A fully downloaded video held on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct CacheEntry {
    /// Remote key the file was downloaded from
    storage_key: String,
    /// Complete file on disk
    local_path: PathBuf,
    /// File size in bytes
    size_bytes: u64,
    /// When the entry was last handed to a caller
    last_access: DateTime<Utc>,
    #[getter(skip)]
    access_seq: u64,
}

impl CacheEntry {
    pub(crate) fn new(
        storage_key: String,
        local_path: PathBuf,
        size_bytes: u64,
        last_access: DateTime<Utc>,
        access_seq: u64,
    ) -> Self {
        Self {
            storage_key,
            local_path,
            size_bytes,
            last_access,
            access_seq,
        }
    }

    pub(crate) fn touch(&mut self, access_seq: u64) {
        self.last_access = Utc::now();
        self.access_seq = access_seq;
    }

    /// Ordering key for LRU eviction; smallest is evicted first.
    pub(crate) fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.last_access, self.access_seq)
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Getters)]
pub struct CacheStats {
    /// Number of cached files
    entry_count: usize,
    /// Bytes held by cached files
    total_bytes: u64,
    /// Configured budget
    max_bytes: u64,
    /// `total_bytes / max_bytes` as a percentage
    utilization_percent: f64,
    /// Downloads currently running
    in_flight: usize,
}

impl CacheStats {
    pub(crate) fn new(entry_count: usize, total_bytes: u64, max_bytes: u64, in_flight: usize) -> Self {
        let utilization_percent = if max_bytes == 0 {
            0.0
        } else {
            total_bytes as f64 / max_bytes as f64 * 100.0
        };
        Self {
            entry_count,
            total_bytes,
            max_bytes,
            utilization_percent,
            in_flight,
        }
    }
}
