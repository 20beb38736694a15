//! Upload ingest: store the original, then derive a thumbnail for videos.

use crate::{IngestConfig, MediaResult, ThumbnailExtractor};
use bytes::Bytes;
use derive_getters::Getters;
use serde::Serialize;
use vouch_error::{MediaError, MediaErrorKind};
use vouch_storage::{ObjectKey, RetryingBlobStore};

/// Result of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct StoredMedia {
    /// Key of the stored original
    object_key: ObjectKey,
    /// Public URL of the original
    public_url: String,
    /// Key of the uploaded thumbnail, for videos with a usable frame
    thumbnail_key: Option<ObjectKey>,
    /// Public URL of the thumbnail
    thumbnail_url: Option<String>,
}

/// Stores uploaded media and their derived thumbnails.
#[derive(Debug, Clone)]
pub struct StorageIngestPipeline {
    store: RetryingBlobStore,
    extractor: ThumbnailExtractor,
    config: IngestConfig,
}

impl StorageIngestPipeline {
    /// Create a pipeline over `store`.
    pub fn new(store: RetryingBlobStore, extractor: ThumbnailExtractor, config: IngestConfig) -> Self {
        Self {
            store,
            extractor,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Public URL for `key`.
    pub fn public_url(&self, key: &ObjectKey) -> String {
        format!("{}{}", self.config.public_url_prefix(), key)
    }

    /// Store an uploaded file.
    ///
    /// The original is uploaded under
    /// `<namespace>/<timestamp>-<base><ext>`. For videos a thumbnail is then
    /// extracted from a scratch copy; if that fails the media is still
    /// stored and `thumbnail_url` is `None`.
    ///
    /// # Errors
    ///
    /// Fails if `buffer` is empty or the upload of the original fails.
    #[tracing::instrument(skip(self, buffer), fields(size = buffer.len()))]
    pub async fn store(
        &self,
        buffer: Bytes,
        original_filename: &str,
        mime_type: &str,
        is_video: bool,
    ) -> MediaResult<StoredMedia> {
        if buffer.is_empty() {
            return Err(MediaError::new(MediaErrorKind::EmptyPayload(
                original_filename.to_string(),
            )));
        }

        let object_key = ObjectKey::for_upload(
            self.config.namespace(),
            original_filename,
            mime_type,
            chrono::Utc::now().timestamp_millis(),
        );

        self.store.upload(object_key.as_str(), buffer.clone()).await?;
        tracing::info!(key = %object_key, mime_type, "Stored upload");

        let thumbnail_key = if is_video {
            self.thumbnail_for(&object_key, &buffer).await
        } else {
            None
        };

        Ok(StoredMedia {
            public_url: self.public_url(&object_key),
            thumbnail_url: thumbnail_key.as_ref().map(|key| self.public_url(key)),
            object_key,
            thumbnail_key,
        })
    }

    /// Delete an object and its derived thumbnail.
    ///
    /// A failure to delete the thumbnail is logged only.
    ///
    /// # Errors
    ///
    /// Fails if the primary object cannot be deleted.
    #[tracing::instrument(skip(self), fields(key = %object_key))]
    pub async fn delete_object(&self, object_key: &ObjectKey) -> MediaResult<()> {
        self.store.delete(object_key.as_str()).await?;
        tracing::info!("Deleted object");

        if let Some(thumbnail) = object_key.thumbnail_key()
            && let Err(e) = self.store.delete(thumbnail.as_str()).await
        {
            tracing::warn!(thumbnail = %thumbnail, error = %e, "Failed to delete thumbnail");
        }

        Ok(())
    }

    /// Write the upload to a scratch file and extract its thumbnail.
    ///
    /// Keys without a separate thumbnail key (extensionless, or already
    /// `.jpg`) get no thumbnail, so `delete_object` can always find it.
    async fn thumbnail_for(&self, object_key: &ObjectKey, buffer: &[u8]) -> Option<ObjectKey> {
        let Some(thumbnail_key) = object_key.thumbnail_key() else {
            tracing::debug!(key = %object_key, "No separate thumbnail key, skipping extraction");
            return None;
        };

        let scratch = match tempfile::Builder::new().prefix("vouch-ingest-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create ingest scratch directory");
                return None;
            }
        };

        let video = scratch.path().join(object_key.file_name());
        if let Err(e) = tokio::fs::write(&video, buffer).await {
            tracing::warn!(path = %video.display(), error = %e, "Failed to write scratch video");
            return None;
        }

        self.extractor.extract_thumbnail_to(&video, &thumbnail_key).await
    }
}
