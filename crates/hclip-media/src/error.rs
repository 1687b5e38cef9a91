//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Frame decode failed: {0}")]
    DecodeFailed(String),

    #[error("Concatenation failed: {0}")]
    ConcatFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid video error.
    pub fn invalid_video(message: impl Into<String>) -> Self {
        Self::InvalidVideo(message.into())
    }

    /// Create a frame decode error.
    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed(message.into())
    }

    /// Create a concatenation error.
    pub fn concat_failed(message: impl Into<String>) -> Self {
        Self::ConcatFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error says the file itself is unusable.
    ///
    /// Corrupt inputs are skipped and never retried; everything else is an
    /// environment or I/O problem.
    pub fn is_corrupt_input(&self) -> bool {
        matches!(
            self,
            MediaError::InvalidVideo(_)
                | MediaError::DecodeFailed(_)
                | MediaError::FfprobeFailed { .. }
                | MediaError::JsonParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_input_classification() {
        assert!(MediaError::invalid_video("no video stream").is_corrupt_input());
        assert!(MediaError::decode_failed("frame 3").is_corrupt_input());
        assert!(!MediaError::FfmpegNotFound.is_corrupt_input());
        assert!(!MediaError::Timeout(5).is_corrupt_input());
    }
}
