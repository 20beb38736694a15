//! HTTP object store backend.
//!
//! Talks to a key-addressed object service:
//!
//! | Operation         | Request                          |
//! |-------------------|----------------------------------|
//! | upload            | `PUT {endpoint}/{key}`           |
//! | download          | `GET {endpoint}/{key}`           |
//! | delete            | `DELETE {endpoint}/{key}`        |
//! | exists            | `HEAD {endpoint}/{key}`          |
//! | list              | `GET {endpoint}?prefix={prefix}` |
//!
//! Listing answers with an `{ "ok": bool, "value": [...], "error": "..." }`
//! envelope; the other calls signal success through the status code.

use crate::{BackendReply, BackendResult, BlobBackend, ByteStream};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use vouch_error::{StorageError, StorageErrorKind};

/// Listing envelope returned by the object service.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    value: Option<T>,
    error: Option<String>,
}

impl<T> From<Envelope<T>> for BackendReply<T> {
    fn from(envelope: Envelope<T>) -> Self {
        BackendReply::Structured {
            ok: envelope.ok,
            value: envelope.value,
            error: envelope.error,
        }
    }
}

/// HTTP storage backend.
#[derive(Debug, Clone)]
pub struct HttpBlobBackend {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpBlobBackend {
    /// Create a backend for the service at `endpoint`.
    ///
    /// `token`, when set, is sent as a bearer token on every request.
    pub fn new(client: Client, endpoint: impl Into<String>, token: Option<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        tracing::info!(endpoint = %endpoint, "Created HTTP blob backend");
        Self {
            client,
            endpoint,
            token,
        }
    }

    /// URL of the object stored under `key`.
    ///
    /// Each key segment is percent-encoded; the `/` separators are kept.
    ///
    /// ```
    /// use vouch_storage::HttpBlobBackend;
    ///
    /// let backend = HttpBlobBackend::new(reqwest::Client::new(), "https://objects.local/", None);
    /// assert_eq!(
    ///     backend.object_url("shared/uploads/1-my clip.mp4"),
    ///     "https://objects.local/shared/uploads/1-my%20clip.mp4"
    /// );
    /// ```
    pub fn object_url(&self, key: &str) -> String {
        let encoded = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.endpoint, encoded)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Backend(e.to_string())))
    }

    /// Turn a non-success status into an error.
    async fn check(key: &str, response: Response) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::new(StorageErrorKind::NotFound(
                key.to_string(),
            )));
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::new(StorageErrorKind::Backend(format!(
            "{} {}: {}",
            status, key, body
        ))))
    }
}

#[async_trait::async_trait]
impl BlobBackend for HttpBlobBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn upload(&self, key: &str, data: Bytes) -> BackendResult<()> {
        let response = self
            .send(self.client.put(self.object_url(key)).body(data))
            .await?;
        Self::check(key, response).await?;
        Ok(BackendReply::Value(()))
    }

    #[tracing::instrument(skip(self))]
    async fn download_bytes(&self, key: &str) -> BackendResult<Bytes> {
        let response = self.send(self.client.get(self.object_url(key))).await?;
        let response = Self::check(key, response).await?;
        let data = response
            .bytes()
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Backend(e.to_string())))?;
        Ok(BackendReply::Value(data))
    }

    #[tracing::instrument(skip(self))]
    async fn download_stream(&self, key: &str) -> BackendResult<ByteStream> {
        let response = self.send(self.client.get(self.object_url(key))).await?;
        let response = Self::check(key, response).await?;
        let stream = response.bytes_stream().map_err(std::io::Error::other).boxed();
        Ok(BackendReply::Value(stream))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> BackendResult<()> {
        let response = self.send(self.client.delete(self.object_url(key))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(BackendReply::Value(()));
        }
        Self::check(key, response).await?;
        Ok(BackendReply::Value(()))
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, key: &str) -> BackendResult<bool> {
        let response = self.send(self.client.head(self.object_url(key))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(BackendReply::Value(false));
        }
        Self::check(key, response).await?;
        Ok(BackendReply::Value(true))
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("prefix", prefix)]);
        let response = self.send(request).await?;
        let response = Self::check(prefix, response).await?;
        let envelope: Envelope<Vec<String>> = response
            .json()
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Backend(e.to_string())))?;
        Ok(envelope.into())
    }
}
