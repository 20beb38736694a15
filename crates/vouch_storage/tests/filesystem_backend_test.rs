//! Tests for the filesystem backend.

use bytes::Bytes;
use futures::TryStreamExt;
use std::sync::Arc;
use tempfile::TempDir;
use vouch_storage::{
    BackendReply, BlobBackend, FileSystemBackend, RetryPolicy, RetryingBlobStore,
    StorageErrorKind,
};

#[tokio::test]
async fn test_upload_and_stream_back() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(FileSystemBackend::new(temp_dir.path())?);
    let store = RetryingBlobStore::new(backend.clone(), RetryPolicy::default());

    let payload: Vec<u8> = (0..300_000u32).map(|i| (i % 199) as u8).collect();
    store.upload("shared/uploads/1-run.mp4", payload.clone()).await?;

    assert!(temp_dir.path().join("shared/uploads/1-run.mp4").exists());

    let chunks: Vec<Bytes> = store
        .download_stream("shared/uploads/1-run.mp4")
        .await?
        .try_collect()
        .await?;
    let streamed: Vec<u8> = chunks.concat();
    assert_eq!(streamed, payload);
    Ok(())
}

#[tokio::test]
async fn test_delete_is_idempotent() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = FileSystemBackend::new(temp_dir.path())?;

    backend.upload("a/b.jpg", Bytes::from_static(b"jpeg")).await?;
    assert_eq!(backend.exists("a/b.jpg").await?, BackendReply::Value(true));

    backend.delete("a/b.jpg").await?;
    backend.delete("a/b.jpg").await?;
    assert_eq!(backend.exists("a/b.jpg").await?, BackendReply::Value(false));
    Ok(())
}

#[tokio::test]
async fn test_list_skips_temp_files_and_filters_prefix() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = FileSystemBackend::new(temp_dir.path())?;

    backend.upload("shared/uploads/2-b.mp4", Bytes::from_static(b"b")).await?;
    backend.upload("shared/uploads/1-a.mp4", Bytes::from_static(b"a")).await?;
    backend.upload("other/3-c.mp4", Bytes::from_static(b"c")).await?;
    std::fs::write(temp_dir.path().join("shared/uploads/.partial.tmp"), b"x")?;

    let listed = backend.list("shared/").await?;
    assert_eq!(
        listed,
        BackendReply::Value(vec![
            "shared/uploads/1-a.mp4".to_string(),
            "shared/uploads/2-b.mp4".to_string(),
        ])
    );
    Ok(())
}

#[tokio::test]
async fn test_keys_escaping_root_are_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = FileSystemBackend::new(temp_dir.path())?;

    for key in ["../escape.mp4", "/etc/passwd", "a/../../b", "a\\b"] {
        let err = backend
            .upload(key, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(
            matches!(err.kind(), StorageErrorKind::InvalidKey(_)),
            "key {key} should be rejected"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_object_is_not_found() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = FileSystemBackend::new(temp_dir.path())?;

    let err = backend.download_bytes("nope.mp4").await.unwrap_err();
    assert!(matches!(err.kind(), StorageErrorKind::NotFound(_)));
    Ok(())
}
