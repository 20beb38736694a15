//! Thumbnail and ingest configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for [`ThumbnailExtractor`](crate::ThumbnailExtractor).
///
/// # Example
///
/// ```
/// use vouch_media::ThumbnailConfig;
///
/// let config = ThumbnailConfig::default().with_width(320).with_height(240);
/// assert_eq!(config.offsets_secs(), &vec![1.0, 2.0, 3.0, 0.5, 4.0]);
/// assert_eq!(*config.width(), 320);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct ThumbnailConfig {
    /// Candidate offsets into the video, tried in order
    #[serde(default = "default_offsets_secs")]
    offsets_secs: Vec<f64>,

    /// Width of the box frames are scaled and padded into
    #[serde(default = "default_width")]
    width: u32,

    /// Height of the box frames are scaled and padded into
    #[serde(default = "default_height")]
    height: u32,

    /// Frames encoding to fewer bytes are treated as blank
    #[serde(default = "default_min_valid_bytes")]
    min_valid_bytes: u64,

    /// ffmpeg binary to run
    #[serde(default = "default_ffmpeg_path")]
    ffmpeg_path: PathBuf,

    /// Time allowed for a single frame grab
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_offsets_secs() -> Vec<f64> {
    vec![1.0, 2.0, 3.0, 0.5, 4.0]
}

fn default_width() -> u32 {
    600
}

fn default_height() -> u32 {
    400
}

fn default_min_valid_bytes() -> u64 {
    1024
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            offsets_secs: default_offsets_secs(),
            width: default_width(),
            height: default_height(),
            min_valid_bytes: default_min_valid_bytes(),
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ThumbnailConfig {
    /// Per-candidate timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where ingested objects are stored and how they are addressed publicly.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct IngestConfig {
    /// Key prefix for uploads and their thumbnails
    #[serde(default = "default_namespace")]
    namespace: String,

    /// Prepended to an object key to form its public URL
    #[serde(default = "default_public_url_prefix")]
    public_url_prefix: String,
}

fn default_namespace() -> String {
    "shared/uploads".to_string()
}

fn default_public_url_prefix() -> String {
    "/media/".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            public_url_prefix: default_public_url_prefix(),
        }
    }
}
