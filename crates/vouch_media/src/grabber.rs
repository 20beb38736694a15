//! Single-frame extraction from video files.

use crate::MediaResult;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use vouch_error::{MediaError, MediaErrorKind};

/// Box a frame is scaled and letterboxed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBox {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

/// Extracts one still frame from a video.
#[async_trait::async_trait]
pub trait FrameGrabber: Send + Sync {
    /// Write the frame at `offset_secs` of `video` to `output` as a JPEG.
    ///
    /// The frame is scaled to fit inside `frame_box`, preserving aspect
    /// ratio, and padded to exactly that size.
    ///
    /// # Errors
    ///
    /// Returns error if the grabber could not run or produced no frame.
    async fn grab_frame(
        &self,
        video: &Path,
        offset_secs: f64,
        output: &Path,
        frame_box: FrameBox,
    ) -> MediaResult<()>;
}

/// Frame grabber backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegFrameGrabber {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegFrameGrabber {
    /// Run `ffmpeg_path`, killing any grab that exceeds `timeout`.
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    fn filter(frame_box: FrameBox) -> String {
        let FrameBox { width, height } = frame_box;
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = width,
            h = height
        )
    }
}

#[async_trait::async_trait]
impl FrameGrabber for FfmpegFrameGrabber {
    #[tracing::instrument(skip(self, output), fields(video = %video.display()))]
    async fn grab_frame(
        &self,
        video: &Path,
        offset_secs: f64,
        output: &Path,
        frame_box: FrameBox,
    ) -> MediaResult<()> {
        let mut cmd = tokio::process::Command::new(&self.ffmpeg_path);
        cmd.arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", offset_secs))
            .arg("-i")
            .arg(video)
            .arg("-frames:v")
            .arg("1")
            .arg("-vf")
            .arg(Self::filter(frame_box))
            .arg("-q:v")
            .arg("2")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                MediaError::new(MediaErrorKind::FrameExtraction(format!(
                    "ffmpeg timed out after {:?} at {}s",
                    self.timeout, offset_secs
                )))
            })?
            .map_err(|e| {
                MediaError::new(MediaErrorKind::Io(format!(
                    "failed to run {}: {}",
                    self.ffmpeg_path.display(),
                    e
                )))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MediaError::new(MediaErrorKind::FrameExtraction(format!(
                "ffmpeg exited with {} at {}s: {}",
                result.status,
                offset_secs,
                stderr.trim()
            ))));
        }

        tracing::debug!(offset_secs, output = %output.display(), "Grabbed frame");
        Ok(())
    }
}
