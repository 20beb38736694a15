//! Disk-backed LRU cache in front of the remote blob store.

use crate::{CacheEntry, CacheStats, VideoCacheConfig};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use vouch_error::{CacheError, CacheErrorKind};
use vouch_storage::RetryingBlobStore;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Suffix of files still being downloaded.
const TEMP_SUFFIX: &str = "tmp";

/// A download shared by every caller waiting on the same key.
type DownloadTask = Shared<BoxFuture<'static, CacheResult<PathBuf>>>;

/// A running download and the id that names its temp file.
struct InFlight {
    id: u64,
    task: DownloadTask,
}

/// Everything guarded by the cache lock.
///
/// `entries` and `in_flight` are checked and updated together so a key is
/// never downloaded twice at once and never visible half-promoted.
/// `cancelled` holds ids of downloads whose key was invalidated while they
/// ran; they are discarded instead of promoted.
#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    cancelled: HashSet<u64>,
    total_bytes: u64,
    access_counter: u64,
    download_counter: u64,
}

impl CacheState {
    fn next_seq(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn next_download_id(&mut self) -> u64 {
        self.download_counter += 1;
        self.download_counter
    }

    /// Drop the in-flight slot of download `id`, if it still owns `key`.
    ///
    /// Returns `true` if the download had been cancelled.
    fn retire(&mut self, key: &str, id: u64) -> bool {
        if self.in_flight.get(key).is_some_and(|flight| flight.id == id) {
            self.in_flight.remove(key);
        }
        self.cancelled.remove(&id)
    }

    fn insert(&mut self, entry: CacheEntry) {
        self.total_bytes += entry.size_bytes();
        if let Some(previous) = self.entries.insert(entry.storage_key().clone(), entry) {
            self.total_bytes -= previous.size_bytes();
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.size_bytes();
        Some(entry)
    }

    fn least_recently_used(&self) -> Option<String> {
        self.entries
            .values()
            .min_by_key(|entry| entry.recency())
            .map(|entry| entry.storage_key().clone())
    }
}

struct CacheInner {
    config: VideoCacheConfig,
    store: RetryingBlobStore,
    state: Mutex<CacheState>,
}

/// Local cache of remotely stored videos.
///
/// Callers ask for a key and get back the path of a complete local file,
/// downloaded on first use. The cache keeps the total size of its files
/// under a byte budget by evicting the least recently used ones, and runs at
/// most one download per key no matter how many callers ask concurrently.
///
/// `DiskVideoCache` is a cheap handle; clone it to share one cache.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vouch_cache::{DiskVideoCache, VideoCacheConfig};
/// use vouch_storage::{MemoryBackend, RetryPolicy, RetryingBlobStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RetryingBlobStore::new(Arc::new(MemoryBackend::new()), RetryPolicy::default());
/// let cache = DiskVideoCache::open(
///     VideoCacheConfig::new("/var/cache/vouch", 2 * 1024 * 1024 * 1024),
///     store,
/// )
/// .await?;
///
/// let path = cache.get_video_file("shared/uploads/1700-run.mp4").await?;
/// println!("serve {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DiskVideoCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for DiskVideoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskVideoCache")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl DiskVideoCache {
    /// Open the cache directory and adopt the files already in it.
    ///
    /// Leftover temp files from an interrupted process are deleted. Existing
    /// cached files are registered with their modification time as last
    /// access, and the oldest are evicted if they exceed the budget.
    ///
    /// # Errors
    ///
    /// Returns error if the cache directory cannot be created or read.
    #[tracing::instrument(skip(config, store), fields(dir = %config.cache_dir().display()))]
    pub async fn open(config: VideoCacheConfig, store: RetryingBlobStore) -> CacheResult<Self> {
        tokio::fs::create_dir_all(config.cache_dir())
            .await
            .map_err(|e| io_error(config.cache_dir(), e))?;

        let mut state = CacheState::default();
        let mut adopted = scan_cache_dir(config.cache_dir()).await?;
        adopted.sort_by_key(|(_, _, _, modified)| *modified);
        for (key, path, size, modified) in adopted {
            let seq = state.next_seq();
            state.insert(CacheEntry::new(key, path, size, modified, seq));
        }

        let inner = Arc::new(CacheInner {
            config,
            store,
            state: Mutex::new(state),
        });

        {
            let mut state = inner.state.lock().await;
            inner.ensure_space(&mut state, 0).await;
            tracing::info!(
                entries = state.entries.len(),
                total_bytes = state.total_bytes,
                max_bytes = inner.config.max_cache_size_bytes(),
                "Opened video cache"
            );
        }

        Ok(Self { inner })
    }

    /// Configuration the cache was opened with.
    pub fn config(&self) -> &VideoCacheConfig {
        &self.inner.config
    }

    /// Local path of a complete copy of `storage_key`.
    ///
    /// Returns immediately on a hit. On a miss the object is streamed from
    /// the store; concurrent callers for the same key share one download and
    /// all observe its outcome.
    ///
    /// # Errors
    ///
    /// Fails if the download fails after the store's retries, the content is
    /// empty or interrupted, the local disk write fails, or the object is
    /// larger than the whole cache budget.
    #[tracing::instrument(skip(self))]
    pub async fn get_video_file(&self, storage_key: &str) -> CacheResult<PathBuf> {
        let task = {
            let mut state = self.inner.state.lock().await;

            if let Some(entry) = state.entries.get(storage_key) {
                let path = entry.local_path().clone();
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    let seq = state.next_seq();
                    if let Some(entry) = state.entries.get_mut(storage_key) {
                        entry.touch(seq);
                    }
                    tracing::debug!(path = %path.display(), "Cache hit");
                    return Ok(path);
                }

                tracing::warn!(path = %path.display(), "Cached file missing on disk, refetching");
                state.remove(storage_key);
            }

            match state.in_flight.get(storage_key) {
                Some(flight) => {
                    tracing::debug!("Joining in-flight download");
                    flight.task.clone()
                }
                None => {
                    let id = state.next_download_id();
                    tracing::debug!(download = id, "Cache miss, starting download");
                    let task = self.spawn_download(storage_key, id);
                    state.in_flight.insert(
                        storage_key.to_string(),
                        InFlight {
                            id,
                            task: task.clone(),
                        },
                    );
                    task
                }
            }
        };

        task.await
    }

    /// Whether `storage_key` currently has a cache entry.
    pub async fn contains(&self, storage_key: &str) -> bool {
        self.inner
            .state
            .lock()
            .await
            .entries
            .contains_key(storage_key)
    }

    /// Snapshot of the entry for `storage_key`.
    pub async fn entry(&self, storage_key: &str) -> Option<CacheEntry> {
        self.inner
            .state
            .lock()
            .await
            .entries
            .get(storage_key)
            .cloned()
    }

    /// Drop the entry for `storage_key` and delete its file.
    ///
    /// A download of `storage_key` already running is cancelled: its
    /// waiters get [`CacheErrorKind::Invalidated`] and its content is never
    /// admitted. The next request starts a fresh download.
    ///
    /// Returns `true` if an entry or a running download was dropped.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(&self, storage_key: &str) -> bool {
        let mut state = self.inner.state.lock().await;

        let cancelled = match state.in_flight.remove(storage_key) {
            Some(flight) => {
                state.cancelled.insert(flight.id);
                tracing::info!(download = flight.id, "Cancelled in-flight download");
                true
            }
            None => false,
        };

        match state.remove(storage_key) {
            Some(entry) => {
                remove_quietly(entry.local_path()).await;
                tracing::info!("Invalidated cache entry");
                true
            }
            None => cancelled,
        }
    }

    /// Delete every cached file.
    ///
    /// Downloads already running are unaffected and will be admitted when
    /// they finish. Returns the number of entries removed.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cache(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let entries: Vec<CacheEntry> = state.entries.drain().map(|(_, entry)| entry).collect();
        state.total_bytes = 0;

        for entry in &entries {
            remove_quietly(entry.local_path()).await;
        }

        tracing::info!(cleared = entries.len(), "Cleared video cache");
        entries.len()
    }

    /// Current size and utilization.
    pub async fn get_stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        CacheStats::new(
            state.entries.len(),
            state.total_bytes,
            *self.inner.config.max_cache_size_bytes(),
            state.in_flight.len(),
        )
    }

    /// Start a background download and wrap it for sharing.
    ///
    /// The download runs on its own task so it completes (and cleans up)
    /// even if every caller that asked for it goes away.
    fn spawn_download(&self, storage_key: &str, id: u64) -> DownloadTask {
        let inner = Arc::clone(&self.inner);
        let key = storage_key.to_string();
        let handle = tokio::spawn({
            let inner = Arc::clone(&inner);
            let key = key.clone();
            async move { inner.download(&key, id).await }
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Download task aborted");
                    remove_quietly(&inner.temp_path(&key, id)).await;
                    inner.state.lock().await.retire(&key, id);
                    Err(CacheError::new(CacheErrorKind::TaskFailed(e.to_string())))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl CacheInner {
    /// Temp file of download `id` for `key`.
    ///
    /// Each download has its own, so a download started after an
    /// invalidation never shares a file with the one it replaced.
    fn temp_path(&self, key: &str, id: u64) -> PathBuf {
        self.config
            .cache_dir()
            .join(format!("{}.{}.{}", safe_file_name(key), id, TEMP_SUFFIX))
    }

    /// Download `key` into the cache and register it.
    ///
    /// On failure no entry is created and no file is left behind.
    async fn download(&self, key: &str, id: u64) -> CacheResult<PathBuf> {
        let started = Instant::now();
        let temp_path = self.temp_path(key, id);
        let final_path = self.config.cache_dir().join(safe_file_name(key));

        let result = match self.stream_to_temp(key, &temp_path).await {
            Ok(size) => self.promote(key, id, &temp_path, &final_path, size).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(path) => {
                tracing::info!(
                    key,
                    path = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Cached video"
                );
            }
            Err(e) => {
                remove_quietly(&temp_path).await;
                self.state.lock().await.retire(key, id);
                tracing::warn!(key, error = %e, "Video download failed");
            }
        }

        result
    }

    /// Stream the object into `temp_path` and return its size.
    async fn stream_to_temp(&self, key: &str, temp_path: &Path) -> CacheResult<u64> {
        let mut stream = self.store.download_stream(key).await?;

        let mut file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| io_error(temp_path, e))?;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                CacheError::new(CacheErrorKind::DownloadIntegrity(format!(
                    "stream for {} interrupted: {}",
                    key, e
                )))
            })?;
            file.write_all(&chunk).await.map_err(|e| {
                CacheError::new(CacheErrorKind::DownloadIntegrity(format!(
                    "write to {} failed: {}",
                    temp_path.display(),
                    e
                )))
            })?;
        }

        file.flush().await.map_err(|e| io_error(temp_path, e))?;
        file.sync_all().await.map_err(|e| io_error(temp_path, e))?;
        drop(file);

        let size = tokio::fs::metadata(temp_path)
            .await
            .map_err(|e| io_error(temp_path, e))?
            .len();

        if size == 0 {
            return Err(CacheError::new(CacheErrorKind::DownloadIntegrity(format!(
                "{} is empty",
                key
            ))));
        }

        Ok(size)
    }

    /// Make room, rename the temp file into place, and register the entry.
    ///
    /// Runs under the cache lock so eviction, promotion and retiring the
    /// in-flight task are observed as one step. A cancelled download is
    /// discarded here.
    async fn promote(
        &self,
        key: &str,
        id: u64,
        temp_path: &Path,
        final_path: &Path,
        size: u64,
    ) -> CacheResult<PathBuf> {
        let max = *self.config.max_cache_size_bytes();
        if size > max {
            return Err(CacheError::new(CacheErrorKind::EvictionExhausted {
                required: size,
                max,
            }));
        }

        let mut state = self.state.lock().await;
        if state.cancelled.contains(&id) {
            return Err(CacheError::new(CacheErrorKind::Invalidated(key.to_string())));
        }

        self.ensure_space(&mut state, size).await;
        if state.total_bytes + size > max {
            return Err(CacheError::new(CacheErrorKind::EvictionExhausted {
                required: size,
                max,
            }));
        }

        tokio::fs::rename(temp_path, final_path)
            .await
            .map_err(|e| io_error(final_path, e))?;

        let seq = state.next_seq();
        state.insert(CacheEntry::new(
            key.to_string(),
            final_path.to_path_buf(),
            size,
            Utc::now(),
            seq,
        ));
        state.retire(key, id);

        Ok(final_path.to_path_buf())
    }

    /// Evict least recently used entries until `required` more bytes fit.
    async fn ensure_space(&self, state: &mut CacheState, required: u64) {
        let max = *self.config.max_cache_size_bytes();

        while state.total_bytes + required > max {
            let Some(oldest) = state.least_recently_used() else {
                break;
            };
            if let Some(entry) = state.remove(&oldest) {
                remove_quietly(entry.local_path()).await;
                tracing::info!(
                    key = %oldest,
                    size = entry.size_bytes(),
                    total_bytes = state.total_bytes,
                    "Evicted cached video"
                );
            }
        }
    }
}

/// Map a storage key to a single flat file name.
///
/// Percent-encoding turns `/` into `%2F`, so the name is reversible.
fn safe_file_name(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

/// Collect `(key, path, size, modified)` for files already in the cache dir.
async fn scan_cache_dir(dir: &Path) -> CacheResult<Vec<(String, PathBuf, u64, DateTime<Utc>)>> {
    let mut adopted = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| io_error(dir, e))?;

    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };

        if path.extension().is_some_and(|ext| ext == TEMP_SUFFIX) {
            tracing::debug!(path = %path.display(), "Removing leftover partial download");
            remove_quietly(&path).await;
            continue;
        }

        let Some(key) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| urlencoding::decode(name).ok())
            .map(|key| key.into_owned())
        else {
            continue;
        };

        if metadata.len() == 0 {
            remove_quietly(&path).await;
            continue;
        }

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        adopted.push((key, path, metadata.len(), modified));
    }

    Ok(adopted)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache file");
    }
}

fn io_error(path: &Path, e: std::io::Error) -> CacheError {
    CacheError::new(CacheErrorKind::Io(format!("{}: {}", path.display(), e)))
}
