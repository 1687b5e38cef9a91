//! Sequential frame reading over an FFmpeg rawvideo pipe.
//!
//! Frames are decoded once, in order, and handed out as packed RGB24 buffers.
//! Large sources are downscaled so a six-second clip does not push gigabytes
//! through the pipe; analyzers only need a face- or caption-sized image.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use hclip_models::VideoFrame;

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Default width frames are scaled down to.
pub const DEFAULT_MAX_FRAME_WIDTH: u32 = 640;

/// Opens clips for sequential frame access.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Open a clip and start decoding.
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameStream>>;
}

/// A stream of decoded frames from one clip.
#[async_trait]
pub trait FrameStream: Send {
    /// Native frame rate of the clip.
    fn fps(&self) -> f64;

    /// Next frame, or `None` once the clip is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<VideoFrame>>;
}

/// [`FrameSource`] backed by FFprobe + FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    max_width: u32,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_WIDTH)
    }
}

impl FfmpegFrameSource {
    pub fn new(max_width: u32) -> Self {
        Self {
            max_width: max_width.max(2),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameStream>> {
        let info = probe_video(path).await?;
        info.validate()?;
        let reader = FrameReader::spawn(path, &info, self.max_width)?;
        Ok(Box::new(reader))
    }
}

/// Reads RGB24 frames from an FFmpeg child process.
pub struct FrameReader {
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    next_index: u64,
    finished: bool,
}

impl FrameReader {
    /// Spawn FFmpeg decoding `path` at (at most) `max_width` pixels wide.
    pub fn spawn(path: &Path, info: &VideoInfo, max_width: u32) -> MediaResult<Self> {
        check_ffmpeg()?;
        let (width, height) = scaled_dimensions(info.width, info.height, max_width);

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args([
                "-vf",
                &format!("scale={}:{}", width, height),
                "-pix_fmt",
                "rgb24",
                "-f",
                "rawvideo",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        debug!(
            "Spawning frame reader for {} at {}x{} ({:.2} fps)",
            path.display(),
            width,
            height,
            info.fps
        );

        let mut child = cmd.spawn().map_err(|e| {
            MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None)
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            width,
            height,
            fps: info.fps,
            next_index: 0,
            finished: false,
        })
    }

    fn frame_len(&self) -> usize {
        VideoFrame::rgb24_len(self.width, self.height)
    }

    /// Reap the child once the pipe is drained.
    async fn finish(&mut self, partial_bytes: usize) -> MediaResult<()> {
        self.finished = true;
        let status = self.child.wait().await?;

        if partial_bytes > 0 {
            return Err(MediaError::decode_failed(format!(
                "truncated frame {} ({} of {} bytes)",
                self.next_index,
                partial_bytes,
                self.frame_len()
            )));
        }
        if !status.success() {
            warn!("Frame reader exited with status {:?}", status.code());
            if self.next_index == 0 {
                return Err(MediaError::decode_failed("no frames decoded"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FrameStream for FrameReader {
    fn fps(&self) -> f64 {
        self.fps
    }

    async fn next_frame(&mut self) -> MediaResult<Option<VideoFrame>> {
        if self.finished {
            return Ok(None);
        }

        let frame_len = self.frame_len();
        let mut data = vec![0u8; frame_len];
        let mut filled = 0;

        while filled < frame_len {
            let read = self.stdout.read(&mut data[filled..]).await?;
            if read == 0 {
                self.finish(filled).await?;
                return Ok(None);
            }
            filled += read;
        }

        let index = self.next_index;
        self.next_index += 1;

        Ok(Some(VideoFrame {
            index,
            offset_secs: frame_offset(index, self.fps),
            width: self.width,
            height: self.height,
            data,
        }))
    }
}

/// Offset of frame `index` at `fps`, in seconds.
pub fn frame_offset(index: u64, fps: f64) -> f64 {
    if fps > 0.0 {
        index as f64 / fps
    } else {
        0.0
    }
}

/// Fit `width x height` inside `max_width`, keeping both sides even.
fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    let even = |v: u32| (v / 2 * 2).max(2);

    if width <= max_width {
        return (even(width), even(height));
    }

    let scaled_height = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (even(max_width), even(scaled_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(1920, 1080, 640), (640, 360));
        assert_eq!(scaled_dimensions(1280, 720, 1280), (1280, 720));
        assert_eq!(scaled_dimensions(639, 481, 640), (638, 480));
        assert_eq!(scaled_dimensions(1080, 1920, 640), (640, 1138));
    }

    #[test]
    fn test_frame_offset() {
        assert_eq!(frame_offset(0, 30.0), 0.0);
        assert!((frame_offset(45, 30.0) - 1.5).abs() < 1e-9);
        assert_eq!(frame_offset(10, 0.0), 0.0);
    }
}
