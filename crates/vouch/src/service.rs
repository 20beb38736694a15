//! Composition root for the media layer.

use crate::{BackendKind, VouchConfig};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use vouch_cache::{CacheStats, DiskVideoCache};
use vouch_error::{ConfigError, VouchResult};
use vouch_media::{FrameGrabber, StorageIngestPipeline, StoredMedia, ThumbnailExtractor};
use vouch_storage::{
    BlobBackend, FileSystemBackend, HttpBlobBackend, MemoryBackend, ObjectKey, RetryingBlobStore,
};

/// The media layer, wired once and shared by clone.
///
/// Route handlers hold a `MediaService` and use it for the three things
/// they need: a local file to stream, storing an upload, and deleting an
/// object.
///
/// # Example
///
/// ```no_run
/// use vouch::{MediaService, VouchConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = MediaService::from_config(&VouchConfig::load()?).await?;
///
/// let stored = service
///     .ingest(bytes::Bytes::from_static(b"..."), "run.mp4", "video/mp4", true)
///     .await?;
/// let local = service.get_video_file(stored.object_key()).await?;
/// println!("stream {}", local.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MediaService {
    store: RetryingBlobStore,
    cache: DiskVideoCache,
    pipeline: StorageIngestPipeline,
}

impl MediaService {
    /// Build the service with the backend and grabber named in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be created or the cache
    /// directory cannot be opened.
    #[tracing::instrument(skip(config), fields(backend = ?config.storage().backend()))]
    pub async fn from_config(config: &VouchConfig) -> VouchResult<Self> {
        let storage = config.storage();
        let backend: Arc<dyn BlobBackend> = match storage.backend() {
            BackendKind::Filesystem => Arc::new(FileSystemBackend::new(storage.root().clone())?),
            BackendKind::Http => {
                let endpoint = storage.endpoint().clone().ok_or_else(|| {
                    ConfigError::new("storage.endpoint is required for the http backend")
                })?;
                let client = reqwest::Client::builder()
                    .user_agent(concat!("vouch/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .map_err(|e| ConfigError::new(format!("Failed to build HTTP client: {}", e)))?;
                Arc::new(HttpBlobBackend::new(client, endpoint, storage.token().clone()))
            }
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };

        let store = RetryingBlobStore::new(backend, storage.retry().clone());
        let extractor = ThumbnailExtractor::with_ffmpeg(
            store.clone(),
            config.thumbnail().clone(),
            storage.namespace().clone(),
        );
        Self::assemble(config, store, extractor).await
    }

    /// Build the service over an explicit backend and frame grabber.
    ///
    /// # Errors
    ///
    /// Returns error if the cache directory cannot be opened.
    pub async fn with_parts(
        config: &VouchConfig,
        backend: Arc<dyn BlobBackend>,
        grabber: Arc<dyn FrameGrabber>,
    ) -> VouchResult<Self> {
        let store = RetryingBlobStore::new(backend, config.storage().retry().clone());
        let extractor = ThumbnailExtractor::new(
            grabber,
            store.clone(),
            config.thumbnail().clone(),
            config.storage().namespace().clone(),
        );
        Self::assemble(config, store, extractor).await
    }

    async fn assemble(
        config: &VouchConfig,
        store: RetryingBlobStore,
        extractor: ThumbnailExtractor,
    ) -> VouchResult<Self> {
        let cache = DiskVideoCache::open(config.cache().clone(), store.clone()).await?;
        let pipeline = StorageIngestPipeline::new(store.clone(), extractor, config.storage().ingest());

        tracing::info!(
            cache_dir = %config.cache().cache_dir().display(),
            namespace = %config.storage().namespace(),
            "Media service ready"
        );
        Ok(Self {
            store,
            cache,
            pipeline,
        })
    }

    /// Retrying blob store.
    pub fn store(&self) -> &RetryingBlobStore {
        &self.store
    }

    /// Local video cache.
    pub fn cache(&self) -> &DiskVideoCache {
        &self.cache
    }

    /// Ingest pipeline.
    pub fn pipeline(&self) -> &StorageIngestPipeline {
        &self.pipeline
    }

    /// Local path of a complete copy of `key`, downloading on a miss.
    ///
    /// # Errors
    ///
    /// See [`DiskVideoCache::get_video_file`].
    pub async fn get_video_file(&self, key: &ObjectKey) -> VouchResult<PathBuf> {
        Ok(self.cache.get_video_file(key.as_str()).await?)
    }

    /// Store an uploaded buffer.
    ///
    /// # Errors
    ///
    /// See [`StorageIngestPipeline::store`].
    pub async fn ingest(
        &self,
        buffer: Bytes,
        original_filename: &str,
        mime_type: &str,
        is_video: bool,
    ) -> VouchResult<StoredMedia> {
        Ok(self
            .pipeline
            .store(buffer, original_filename, mime_type, is_video)
            .await?)
    }

    /// Delete an object and its thumbnail, and drop any cached copy.
    ///
    /// A download of `key` still running in the cache is cancelled, so
    /// content deleted remotely is never admitted afterwards.
    ///
    /// # Errors
    ///
    /// Fails if the primary object cannot be deleted remotely.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn delete_object(&self, key: &ObjectKey) -> VouchResult<()> {
        self.pipeline.delete_object(key).await?;
        self.cache.invalidate(key.as_str()).await;
        Ok(())
    }

    /// Cache statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.get_stats().await
    }
}
