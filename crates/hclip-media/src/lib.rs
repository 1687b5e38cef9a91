#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and clip readiness guard.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with progress parsing and cancellation
//! - FFprobe stream metadata
//! - Sequential RGB24 frame reading over an FFmpeg pipe
//! - Readiness/corruption checks for clips written by an external producer
//! - Stream-copy concatenation and SRT caption sidecars

pub mod captions;
pub mod command;
pub mod concat;
pub mod copy;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod guard;
pub mod probe;
pub mod progress;

pub use captions::build_srt;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegOutcome, FfmpegRunner};
pub use concat::{concat_clips, ConcatReport, Concatenator, FfmpegConcatenator};
pub use copy::ClipCopy;
pub use error::{MediaError, MediaResult};
pub use frames::{FfmpegFrameSource, FrameReader, FrameSource, FrameStream};
pub use guard::{
    ClipInspector, ClipReadinessGuard, FfmpegInspector, GuardConfig, Readiness, ReadyState,
    Stability, StabilityTracker,
};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
