//! Thumbnails and upload ingest for Vouch media.
//!
//! - [`ThumbnailExtractor`] picks a usable still frame from a video and
//!   uploads it as a JPEG next to the original
//! - [`StorageIngestPipeline`] stores uploaded buffers under generated keys
//!   and attaches a thumbnail for videos
//!
//! Frames are grabbed through the [`FrameGrabber`] trait; the production
//! implementation shells out to `ffmpeg`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod grabber;
mod ingest;
mod thumbnail;

pub use config::{IngestConfig, IngestConfigBuilder, ThumbnailConfig, ThumbnailConfigBuilder};
pub use grabber::{FfmpegFrameGrabber, FrameBox, FrameGrabber};
pub use ingest::{StorageIngestPipeline, StoredMedia};
pub use thumbnail::ThumbnailExtractor;

pub use vouch_error::{MediaError, MediaErrorKind};

/// Result type for media operations.
pub type MediaResult<T> = std::result::Result<T, MediaError>;
