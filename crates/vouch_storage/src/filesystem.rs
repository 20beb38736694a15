//! Filesystem-backed object store.
//!
//! Objects live under a root directory with each `/`-separated key segment
//! mapped to a directory, so `shared/uploads/1-a.mp4` is stored at
//! `{root}/shared/uploads/1-a.mp4`. Useful for local development and as
//! the target of a mounted volume.

use crate::{BackendReply, BackendResult, BlobBackend, ByteStream, StorageResult};
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio_util::io::ReaderStream;
use uuid::Uuid;
use vouch_error::{StorageError, StorageErrorKind};

/// Suffix of in-progress writes; never listed as objects.
const TEMP_SUFFIX: &str = "tmp";

/// Filesystem storage backend.
///
/// # Features
///
/// - **Atomic writes**: Uses temp file + rename so readers never see a
///   partial object
/// - **Idempotent deletes**: Removing a missing object succeeds
/// - **Path safety**: Keys that would escape the root are rejected
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    root: PathBuf,
}

impl FileSystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    ///
    /// Creates the root directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or accessed.
    #[tracing::instrument(skip(root))]
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                root.display(),
                e
            )))
        })?;

        tracing::info!(path = %root.display(), "Created filesystem blob backend");
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to its on-disk path, rejecting keys that escape the root.
    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && !key.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(StorageError::new(StorageErrorKind::InvalidKey(
                key.to_string(),
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn read_file(&self, key: &str) -> StorageResult<tokio::fs::File> {
        let path = self.object_path(key)?;
        tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(key.to_string()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        })
    }

    /// Walk the tree below the root collecting object keys.
    async fn collect_keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    StorageError::new(StorageErrorKind::FileRead(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                })?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == TEMP_SUFFIX) {
                    continue;
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }

        Ok(keys)
    }
}

#[async_trait::async_trait]
impl BlobBackend for FileSystemBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn upload(&self, key: &str, data: Bytes) -> BackendResult<()> {
        let path = self.object_path(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_file_name(format!(
            ".{}.{}",
            Uuid::new_v4(),
            TEMP_SUFFIX
        ));
        if let Err(e) = tokio::fs::write(&temp_path, &data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            ))));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))));
        }

        tracing::debug!(key, path = %path.display(), size = data.len(), "Stored object");
        Ok(BackendReply::Value(()))
    }

    #[tracing::instrument(skip(self))]
    async fn download_bytes(&self, key: &str) -> BackendResult<Bytes> {
        let path = self.object_path(key)?;
        let data = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(key.to_string()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        })?;

        tracing::debug!(key, size = data.len(), "Read object");
        Ok(BackendReply::Value(Bytes::from(data)))
    }

    #[tracing::instrument(skip(self))]
    async fn download_stream(&self, key: &str) -> BackendResult<ByteStream> {
        let file = self.read_file(key).await?;
        Ok(BackendReply::Value(ReaderStream::new(file).boxed()))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> BackendResult<()> {
        let path = self.object_path(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key, "Deleted object");
                Ok(BackendReply::Value(()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key, "Object already absent");
                Ok(BackendReply::Value(()))
            }
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "delete {}: {}",
                path.display(),
                e
            )))),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, key: &str) -> BackendResult<bool> {
        let path = self.object_path(key)?;
        let exists = tokio::fs::try_exists(&path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(BackendReply::Value(exists))
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .collect_keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(BackendReply::Value(keys))
    }
}
