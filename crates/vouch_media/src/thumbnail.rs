//! Video thumbnail extraction.

use crate::{FfmpegFrameGrabber, FrameBox, FrameGrabber, ThumbnailConfig};
use std::path::Path;
use std::sync::Arc;
use vouch_storage::{ObjectKey, RetryingBlobStore};

/// Produces and uploads a representative JPEG for a video.
///
/// Leading frames are often black or blank, so several offsets are tried
/// in order and the first frame that encodes to a plausible size wins.
/// Extraction never fails the caller: every problem is logged and reported
/// as `None`.
#[derive(Clone)]
pub struct ThumbnailExtractor {
    grabber: Arc<dyn FrameGrabber>,
    store: RetryingBlobStore,
    config: ThumbnailConfig,
    namespace: String,
}

impl std::fmt::Debug for ThumbnailExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailExtractor")
            .field("config", &self.config)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ThumbnailExtractor {
    /// Create an extractor uploading into `namespace`.
    pub fn new(
        grabber: Arc<dyn FrameGrabber>,
        store: RetryingBlobStore,
        config: ThumbnailConfig,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            grabber,
            store,
            config,
            namespace: namespace.into(),
        }
    }

    /// Create an extractor that runs the configured `ffmpeg` binary.
    pub fn with_ffmpeg(
        store: RetryingBlobStore,
        config: ThumbnailConfig,
        namespace: impl Into<String>,
    ) -> Self {
        let grabber = FfmpegFrameGrabber::new(config.ffmpeg_path().clone(), config.timeout());
        Self::new(Arc::new(grabber), store, config, namespace)
    }

    /// Active configuration.
    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Extract a thumbnail for `video` and upload it.
    ///
    /// The target is the thumbnail key of `<namespace>/<video file name>`.
    /// Returns its key, or `None` if that key has no separate thumbnail, no
    /// candidate frame was usable or the upload failed.
    pub async fn extract_thumbnail(&self, video: &Path) -> Option<ObjectKey> {
        let Some(file_name) = video.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(video = %video.display(), "Video path has no usable file name");
            return None;
        };
        let Some(key) = ObjectKey::in_namespace(&self.namespace, file_name).thumbnail_key() else {
            tracing::debug!(video = %video.display(), "Video has no separate thumbnail key");
            return None;
        };
        self.extract_thumbnail_to(video, &key).await
    }

    /// Extract a thumbnail for `video` and upload it under `key`.
    ///
    /// Returns `key` on success, or `None` if no candidate frame was usable
    /// or the upload failed.
    #[tracing::instrument(skip(self), fields(video = %video.display(), key = %key))]
    pub async fn extract_thumbnail_to(&self, video: &Path, key: &ObjectKey) -> Option<ObjectKey> {
        let scratch = match tempfile::Builder::new().prefix("vouch-thumb-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create thumbnail scratch directory");
                return None;
            }
        };

        let frame_box = FrameBox {
            width: *self.config.width(),
            height: *self.config.height(),
        };

        for (index, offset) in self.config.offsets_secs().iter().copied().enumerate() {
            let candidate = scratch.path().join(format!("frame-{}.jpg", index));

            if let Err(e) = self
                .grabber
                .grab_frame(video, offset, &candidate, frame_box)
                .await
            {
                tracing::warn!(offset, error = %e, "Frame grab failed, trying next offset");
                continue;
            }

            let data = match tokio::fs::read(&candidate).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(offset, error = %e, "Grabbed frame unreadable");
                    continue;
                }
            };

            if (data.len() as u64) < *self.config.min_valid_bytes() {
                tracing::warn!(
                    offset,
                    size = data.len(),
                    min = *self.config.min_valid_bytes(),
                    "Rejected blank frame"
                );
                continue;
            }

            let size = data.len();
            return match self.store.upload(key.as_str(), data).await {
                Ok(()) => {
                    tracing::info!(offset, size, "Uploaded thumbnail");
                    Some(key.clone())
                }
                Err(e) => {
                    tracing::error!(error = %e, "Thumbnail upload failed");
                    None
                }
            };
        }

        tracing::warn!(
            candidates = self.config.offsets_secs().len(),
            "No usable frame found"
        );
        None
    }
}
