//! Namespaced object keys.
//!
//! Uploaded objects are stored under `<namespace>/<timestamp>-<base><ext>`.
//! A video's thumbnail shares the same `<timestamp>-<base>` with a `.jpg`
//! extension, so it can always be located (and deleted) from the video key
//! alone.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extension used for derived thumbnails.
pub const THUMBNAIL_EXTENSION: &str = "jpg";

/// Stem used when an uploaded filename has no usable characters.
const FALLBACK_BASE: &str = "upload";

/// Opaque key identifying an object in the remote store.
///
/// # Example
///
/// ```
/// use vouch_storage::ObjectKey;
///
/// let key = ObjectKey::for_upload("shared/uploads", "My Run!.MP4", "video/mp4", 1_700_000_000_000);
/// assert_eq!(key.as_str(), "shared/uploads/1700000000000-My_Run_.mp4");
/// assert_eq!(
///     key.thumbnail_key().map(|k| k.to_string()),
///     Some("shared/uploads/1700000000000-My_Run_.jpg".to_string())
/// );
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
#[display("{}", _0)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap an existing key string without validation.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Join a namespace and a file name.
    pub fn in_namespace(namespace: &str, file_name: &str) -> Self {
        let namespace = namespace.trim_matches('/');
        if namespace.is_empty() {
            Self(file_name.to_string())
        } else {
            Self(format!("{}/{}", namespace, file_name))
        }
    }

    /// Build the key for a freshly uploaded file.
    ///
    /// The extension comes from `original_filename` when it has one, and
    /// from the MIME type otherwise.
    pub fn for_upload(
        namespace: &str,
        original_filename: &str,
        mime_type: &str,
        timestamp_ms: i64,
    ) -> Self {
        let path = Path::new(original_filename);
        let base = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(sanitize_base)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_BASE.to_string());

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .or_else(|| {
                mime_guess::get_mime_extensions_str(mime_type)
                    .and_then(|exts| exts.first())
                    .map(|e| e.to_string())
            });

        let file_name = match extension {
            Some(ext) => format!("{}-{}.{}", timestamp_ms, base, ext),
            None => format!("{}-{}", timestamp_ms, base),
        };

        Self::in_namespace(namespace, &file_name)
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the final `/`, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(ns, _)| ns)
    }

    /// The final path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Key of the thumbnail derived from this object.
    ///
    /// Returns `None` when the key has no extension, or when the derived key
    /// would be this key itself (the object already is a `.jpg`).
    pub fn thumbnail_key(&self) -> Option<ObjectKey> {
        Path::new(self.file_name()).extension()?;
        let thumbnail = thumbnail_file_name(self.file_name());
        let derived = match self.namespace() {
            Some(ns) => ObjectKey::in_namespace(ns, &thumbnail),
            None => ObjectKey::new(thumbnail),
        };
        (derived != *self).then_some(derived)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Replace a file name's extension with `.jpg`, keeping its base name.
///
/// ```
/// use vouch_storage::thumbnail_file_name;
///
/// assert_eq!(thumbnail_file_name("1700-run.mov"), "1700-run.jpg");
/// assert_eq!(thumbnail_file_name("1700-run"), "1700-run.jpg");
/// ```
pub fn thumbnail_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .with_extension(THUMBNAIL_EXTENSION)
        .to_string_lossy()
        .into_owned()
}

fn sanitize_base(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
