//! Tests for thumbnail extraction.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vouch_media::{
    FfmpegFrameGrabber, FrameBox, FrameGrabber, MediaError, MediaErrorKind, MediaResult,
    ThumbnailConfig, ThumbnailExtractor,
};
use vouch_storage::{
    FailureShape, MemoryBackend, ObjectKey, RetryPolicy, RetryingBlobStore, StorageOperation,
};

/// Writes a JPEG-sized blob whose length depends on the offset.
struct ScriptedGrabber {
    frames: Vec<(f64, Option<usize>)>,
    calls: Mutex<Vec<(f64, FrameBox)>>,
}

impl ScriptedGrabber {
    fn new(frames: Vec<(f64, Option<usize>)>) -> Arc<Self> {
        Arc::new(Self {
            frames,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn offsets(&self) -> Vec<f64> {
        self.calls.lock().unwrap().iter().map(|(o, _)| *o).collect()
    }
}

#[async_trait::async_trait]
impl FrameGrabber for ScriptedGrabber {
    async fn grab_frame(
        &self,
        _video: &Path,
        offset_secs: f64,
        output: &Path,
        frame_box: FrameBox,
    ) -> MediaResult<()> {
        self.calls.lock().unwrap().push((offset_secs, frame_box));
        let size = self
            .frames
            .iter()
            .find(|(offset, _)| *offset == offset_secs)
            .and_then(|(_, size)| *size);
        match size {
            Some(size) => {
                tokio::fs::write(output, vec![0xFFu8; size]).await.unwrap();
                Ok(())
            }
            None => Err(MediaError::new(MediaErrorKind::FrameExtraction(
                "offset past end of clip".to_string(),
            ))),
        }
    }
}

fn store_with(backend: Arc<MemoryBackend>) -> RetryingBlobStore {
    RetryingBlobStore::new(backend, RetryPolicy::new(2, Duration::from_millis(5)))
}

fn video_file(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"not really a video").unwrap();
    path
}

#[tokio::test]
async fn test_blank_leading_frame_falls_back_to_next_offset() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let backend = Arc::new(MemoryBackend::new());
    let grabber = ScriptedGrabber::new(vec![(1.0, Some(500)), (2.0, Some(2000))]);
    let extractor = ThumbnailExtractor::new(
        grabber.clone(),
        store_with(backend.clone()),
        ThumbnailConfig::default(),
        "shared/uploads",
    );

    let key = extractor
        .extract_thumbnail(&video_file(&dir, "1700-run.mp4"))
        .await;

    assert_eq!(key, Some(ObjectKey::new("shared/uploads/1700-run.jpg")));
    assert_eq!(grabber.offsets(), vec![1.0, 2.0]);
    let uploaded = backend.get("shared/uploads/1700-run.jpg").await.unwrap();
    assert_eq!(uploaded.len(), 2000);
    assert_eq!(backend.call_count(StorageOperation::Upload).await, 1);
    Ok(())
}

#[tokio::test]
async fn test_frames_use_configured_box() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let grabber = ScriptedGrabber::new(vec![(1.0, Some(4096))]);
    let config = ThumbnailConfig::default().with_width(320).with_height(180);
    let extractor = ThumbnailExtractor::new(
        grabber.clone(),
        store_with(Arc::new(MemoryBackend::new())),
        config,
        "shared/uploads",
    );

    assert!(extractor
        .extract_thumbnail(&video_file(&dir, "1-a.webm"))
        .await
        .is_some());

    let calls = grabber.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![(
            1.0,
            FrameBox {
                width: 320,
                height: 180
            }
        )]
    );
    Ok(())
}

#[tokio::test]
async fn test_grab_errors_move_on_to_next_offset() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let backend = Arc::new(MemoryBackend::new());
    let grabber = ScriptedGrabber::new(vec![(1.0, None), (2.0, None), (3.0, None), (0.5, Some(3000))]);
    let extractor = ThumbnailExtractor::new(
        grabber.clone(),
        store_with(backend.clone()),
        ThumbnailConfig::default(),
        "shared/uploads",
    );

    let key = extractor
        .extract_thumbnail(&video_file(&dir, "9-short.mov"))
        .await;

    assert_eq!(key, Some(ObjectKey::new("shared/uploads/9-short.jpg")));
    assert_eq!(grabber.offsets(), vec![1.0, 2.0, 3.0, 0.5]);
    Ok(())
}

#[tokio::test]
async fn test_no_usable_frame_returns_none_without_upload() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let backend = Arc::new(MemoryBackend::new());
    let grabber = ScriptedGrabber::new(vec![
        (1.0, Some(100)),
        (2.0, Some(200)),
        (3.0, Some(1023)),
        (0.5, None),
        (4.0, Some(0)),
    ]);
    let extractor = ThumbnailExtractor::new(
        grabber.clone(),
        store_with(backend.clone()),
        ThumbnailConfig::default(),
        "shared/uploads",
    );

    let key = extractor
        .extract_thumbnail(&video_file(&dir, "2-dark.mp4"))
        .await;

    assert_eq!(key, None);
    assert_eq!(grabber.offsets().len(), 5);
    assert_eq!(backend.total_calls().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_upload_failure_returns_none() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let backend = Arc::new(MemoryBackend::new());
    backend
        .fail_next(StorageOperation::Upload, 5, FailureShape::Error)
        .await;
    let extractor = ThumbnailExtractor::new(
        ScriptedGrabber::new(vec![(1.0, Some(2048))]),
        store_with(backend.clone()),
        ThumbnailConfig::default(),
        "shared/uploads",
    );

    let key = extractor
        .extract_thumbnail(&video_file(&dir, "3-clip.mp4"))
        .await;

    assert_eq!(key, None);
    assert_eq!(backend.call_count(StorageOperation::Upload).await, 2);
    Ok(())
}

#[tokio::test]
async fn test_missing_ffmpeg_binary_is_an_io_error() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let grabber = FfmpegFrameGrabber::new(
        dir.path().join("no-such-ffmpeg"),
        Duration::from_secs(5),
    );

    let err = grabber
        .grab_frame(
            &video_file(&dir, "4-a.mp4"),
            1.0,
            &dir.path().join("out.jpg"),
            FrameBox {
                width: 600,
                height: 400,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), MediaErrorKind::Io(_)));
    Ok(())
}

#[tokio::test]
async fn test_jpg_or_extensionless_video_has_no_thumbnail_target() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let backend = Arc::new(MemoryBackend::new());
    let grabber = ScriptedGrabber::new(vec![(1.0, Some(4096))]);
    let extractor = ThumbnailExtractor::new(
        grabber.clone(),
        store_with(backend.clone()),
        ThumbnailConfig::default(),
        "shared/uploads",
    );

    assert_eq!(extractor.extract_thumbnail(&video_file(&dir, "5-still.jpg")).await, None);
    assert_eq!(extractor.extract_thumbnail(&video_file(&dir, "6-raw")).await, None);

    assert!(grabber.offsets().is_empty());
    assert_eq!(backend.total_calls().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_extract_to_uploads_under_given_key() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let backend = Arc::new(MemoryBackend::new());
    let extractor = ThumbnailExtractor::new(
        ScriptedGrabber::new(vec![(1.0, Some(2048))]),
        store_with(backend.clone()),
        ThumbnailConfig::default(),
        "shared/uploads",
    );
    let target = ObjectKey::new("shared/uploads/8-lift.jpg");

    let key = extractor
        .extract_thumbnail_to(&video_file(&dir, "scratch-copy.mp4"), &target)
        .await;

    assert_eq!(key, Some(target.clone()));
    assert_eq!(backend.get(target.as_str()).await.unwrap().len(), 2048);
    Ok(())
}
