//! Tests for the retrying blob store.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vouch_storage::{
    FailureShape, MemoryBackend, RetryPolicy, RetryingBlobStore, StorageErrorKind,
    StorageOperation,
};

fn store_with(backend: Arc<MemoryBackend>) -> RetryingBlobStore {
    RetryingBlobStore::new(backend, RetryPolicy::default())
}

#[tokio::test(start_paused = true)]
async fn test_upload_recovers_after_transient_errors() {
    let backend = Arc::new(MemoryBackend::new());
    let store = store_with(backend.clone());
    backend
        .fail_next(StorageOperation::Upload, 2, FailureShape::Error)
        .await;

    let started = Instant::now();
    store.upload("shared/uploads/1-a.mp4", b"video".to_vec()).await.unwrap();

    // Linear backoff: 1s after the first failure, 2s after the second
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(backend.call_count(StorageOperation::Upload).await, 3);
    assert_eq!(
        backend.get("shared/uploads/1-a.mp4").await.unwrap().as_ref(),
        b"video"
    );
}

#[tokio::test(start_paused = true)]
async fn test_structured_failure_is_retried_like_an_error() {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert("shared/uploads/1-a.mp4", b"abc".to_vec()).await;
    backend
        .fail_next(StorageOperation::DownloadBytes, 1, FailureShape::Structured)
        .await;
    let store = store_with(backend.clone());

    let started = Instant::now();
    let data = store.download_bytes("shared/uploads/1-a.mp4").await.unwrap();

    assert_eq!(data.as_ref(), b"abc");
    assert_eq!(started.elapsed(), Duration::from_secs(1));
    assert_eq!(backend.call_count(StorageOperation::DownloadBytes).await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_report_operation_and_cause() {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .fail_next(StorageOperation::Delete, 10, FailureShape::Structured)
        .await;
    let store = store_with(backend.clone());

    let started = Instant::now();
    let err = store.delete("shared/uploads/1-a.mp4").await.unwrap_err();

    // No wait after the final attempt
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(backend.call_count(StorageOperation::Delete).await, 3);
    match err.kind() {
        StorageErrorKind::Operation {
            operation,
            attempts,
            cause,
        } => {
            assert_eq!(*operation, StorageOperation::Delete);
            assert_eq!(*attempts, 3);
            assert!(cause.contains("scripted delete failure"));
        }
        other => panic!("unexpected error kind: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_missing_object_fails_after_all_attempts() {
    let backend = Arc::new(MemoryBackend::new());
    let store = store_with(backend.clone());

    let result = store.download_stream("shared/uploads/missing.mp4").await;

    assert!(matches!(
        result.map(|_| ()).unwrap_err().kind(),
        StorageErrorKind::Operation {
            operation: StorageOperation::DownloadStream,
            attempts: 3,
            ..
        }
    ));
    assert_eq!(backend.call_count(StorageOperation::DownloadStream).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_still_attempts_once() {
    let backend = Arc::new(MemoryBackend::new());
    let store = RetryingBlobStore::new(
        backend.clone(),
        RetryPolicy::new(0, Duration::from_millis(500)),
    );
    backend
        .fail_next(StorageOperation::Exists, 1, FailureShape::Error)
        .await;

    assert!(store.exists("shared/uploads/1-a.mp4").await.is_err());
    assert_eq!(backend.call_count(StorageOperation::Exists).await, 1);
}

#[tokio::test]
async fn test_empty_key_is_rejected_without_calling_backend() {
    let backend = Arc::new(MemoryBackend::new());
    let store = store_with(backend.clone());

    let err = store.upload("  ", b"x".to_vec()).await.unwrap_err();

    assert!(matches!(err.kind(), StorageErrorKind::InvalidKey(_)));
    assert_eq!(backend.total_calls().await, 0);
}

#[tokio::test]
async fn test_round_trip_and_listing() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let store = store_with(backend);
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    store.upload("shared/uploads/1-a.mp4", payload.clone()).await?;
    store.upload("shared/uploads/2-b.jpg", b"jpeg".to_vec()).await?;
    store.upload("private/3-c.mp4", b"other".to_vec()).await?;

    assert_eq!(store.download_bytes("shared/uploads/1-a.mp4").await?.as_ref(), &payload[..]);
    assert!(store.exists("shared/uploads/2-b.jpg").await?);
    assert!(!store.exists("shared/uploads/9-z.jpg").await?);

    let keys = store.list("shared/").await?;
    assert_eq!(keys, vec!["shared/uploads/1-a.mp4", "shared/uploads/2-b.jpg"]);
    Ok(())
}

#[test]
fn test_policy_delays_are_linear() {
    let policy = RetryPolicy::new(4, Duration::from_millis(250));
    let delays: Vec<_> = policy.delays().collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(250),
            Duration::from_millis(500),
            Duration::from_millis(750)
        ]
    );
    assert_eq!(RetryPolicy::default().attempts(), 3);
}
