//! Tests for the upload ingest pipeline.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use vouch_media::{
    FrameBox, FrameGrabber, IngestConfig, MediaErrorKind, MediaResult, StorageIngestPipeline,
    ThumbnailConfig, ThumbnailExtractor,
};
use vouch_storage::{
    FailureShape, MemoryBackend, ObjectKey, RetryPolicy, RetryingBlobStore, StorageOperation,
};

/// Copies the first bytes of the video as the "frame" so the test can check
/// the extractor saw the uploaded content.
#[derive(Default)]
struct EchoGrabber {
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl FrameGrabber for EchoGrabber {
    async fn grab_frame(
        &self,
        video: &Path,
        _offset_secs: f64,
        output: &Path,
        _frame_box: FrameBox,
    ) -> MediaResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let data = tokio::fs::read(video).await.unwrap();
        tokio::fs::write(output, &data[..data.len().min(4096)]).await.unwrap();
        Ok(())
    }
}

fn pipeline(backend: Arc<MemoryBackend>, grabber: Arc<EchoGrabber>) -> StorageIngestPipeline {
    let store = RetryingBlobStore::new(backend, RetryPolicy::new(2, Duration::from_millis(5)));
    let config = IngestConfig::default().with_public_url_prefix("https://cdn.example/".to_string());
    let extractor = ThumbnailExtractor::new(
        grabber,
        store.clone(),
        ThumbnailConfig::default(),
        config.namespace().clone(),
    );
    StorageIngestPipeline::new(store, extractor, config)
}

#[tokio::test]
async fn test_image_is_stored_without_thumbnail() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let grabber = Arc::new(EchoGrabber::default());
    let pipeline = pipeline(backend.clone(), grabber.clone());

    let stored = pipeline
        .store(Bytes::from_static(b"png bytes"), "Proof Photo.PNG", "image/png", false)
        .await?;

    let key = stored.object_key().as_str();
    assert!(key.starts_with("shared/uploads/"));
    assert!(key.ends_with("-Proof_Photo.png"));
    assert_eq!(stored.public_url(), &format!("https://cdn.example/{}", key));
    assert_eq!(stored.thumbnail_url(), &None);
    assert_eq!(backend.get(key).await.unwrap().as_ref(), b"png bytes");
    assert_eq!(grabber.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_video_gets_thumbnail_next_to_original() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let grabber = Arc::new(EchoGrabber::default());
    let pipeline = pipeline(backend.clone(), grabber.clone());
    let video = Bytes::from(vec![42u8; 10_000]);

    let stored = pipeline.store(video, "run.mp4", "video/mp4", true).await?;

    let expected = stored.object_key().thumbnail_key().unwrap();
    assert_eq!(stored.thumbnail_key(), &Some(expected.clone()));
    assert_eq!(
        stored.thumbnail_url(),
        &Some(format!("https://cdn.example/{}", expected))
    );
    let thumbnail = backend.get(expected.as_str()).await.unwrap();
    assert_eq!(thumbnail.as_ref(), &[42u8; 4096][..]);
    assert_eq!(grabber.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_tiny_video_stores_without_thumbnail() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = pipeline(backend.clone(), Arc::new(EchoGrabber::default()));

    let stored = pipeline
        .store(Bytes::from_static(b"tiny"), "clip.webm", "video/webm", true)
        .await?;

    assert_eq!(stored.thumbnail_url(), &None);
    assert!(backend.get(stored.object_key().as_str()).await.is_some());
    Ok(())
}

#[tokio::test]
async fn test_empty_payload_is_rejected() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = pipeline(backend.clone(), Arc::new(EchoGrabber::default()));

    let err = pipeline
        .store(Bytes::new(), "empty.mp4", "video/mp4", true)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), &MediaErrorKind::EmptyPayload("empty.mp4".to_string()));
    assert_eq!(backend.total_calls().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_upload_failure_aborts_ingest() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .fail_next(StorageOperation::Upload, 2, FailureShape::Structured)
        .await;
    let grabber = Arc::new(EchoGrabber::default());
    let pipeline = pipeline(backend.clone(), grabber.clone());

    let err = pipeline
        .store(Bytes::from(vec![1u8; 5000]), "run.mp4", "video/mp4", true)
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), MediaErrorKind::Storage(_)));
    assert_eq!(grabber.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_delete_removes_object_and_thumbnail() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = pipeline(backend.clone(), Arc::new(EchoGrabber::default()));

    let stored = pipeline
        .store(Bytes::from(vec![7u8; 8000]), "lift.mov", "video/quicktime", true)
        .await?;
    let thumbnail = stored.thumbnail_key().clone().unwrap();
    assert!(backend.get(thumbnail.as_str()).await.is_some());

    pipeline.delete_object(stored.object_key()).await?;

    assert!(backend.get(stored.object_key().as_str()).await.is_none());
    assert!(backend.get(thumbnail.as_str()).await.is_none());
    assert_eq!(backend.call_count(StorageOperation::Delete).await, 2);

    // Deleting again is harmless
    pipeline.delete_object(stored.object_key()).await?;
    Ok(())
}

#[tokio::test]
async fn test_delete_of_jpeg_issues_single_delete() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert("shared/uploads/5-photo.jpg", b"jpeg".to_vec()).await;
    let pipeline = pipeline(backend.clone(), Arc::new(EchoGrabber::default()));

    pipeline
        .delete_object(&ObjectKey::new("shared/uploads/5-photo.jpg"))
        .await?;

    assert_eq!(backend.call_count(StorageOperation::Delete).await, 1);
    Ok(())
}

#[tokio::test]
async fn test_jpg_named_video_keeps_its_original() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let grabber = Arc::new(EchoGrabber::default());
    let pipeline = pipeline(backend.clone(), grabber.clone());

    let stored = pipeline
        .store(Bytes::from(vec![9u8; 10_000]), "clip.jpg", "video/mp4", true)
        .await?;

    assert!(stored.object_key().as_str().ends_with("-clip.jpg"));
    assert_eq!(stored.thumbnail_key(), &None);
    assert_eq!(stored.thumbnail_url(), &None);
    let original = backend.get(stored.object_key().as_str()).await.unwrap();
    assert_eq!(original.len(), 10_000);
    assert_eq!(grabber.calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.call_count(StorageOperation::Upload).await, 1);
    Ok(())
}

#[tokio::test]
async fn test_extensionless_video_leaves_nothing_after_delete() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let grabber = Arc::new(EchoGrabber::default());
    let pipeline = pipeline(backend.clone(), grabber.clone());

    let stored = pipeline
        .store(Bytes::from(vec![3u8; 5000]), "clip", "application/x-unknown-vid", true)
        .await?;

    let key = stored.object_key().clone();
    assert!(key.as_str().ends_with("-clip"));
    assert_eq!(stored.thumbnail_key(), &None);
    assert_eq!(grabber.calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.call_count(StorageOperation::Upload).await, 1);

    pipeline.delete_object(&key).await?;

    assert!(backend.get(key.as_str()).await.is_none());
    assert!(backend.get(&format!("{}.jpg", key)).await.is_none());
    Ok(())
}
