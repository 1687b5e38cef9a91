//! Analyzer seams.

use async_trait::async_trait;
use std::path::Path;

use hclip_models::VideoFrame;

use crate::error::MlResult;
use crate::types::TranscriptSegment;

/// Labels the dominant facial emotion in a frame.
#[async_trait]
pub trait EmotionAnalyzer: Send + Sync {
    /// `Ok(None)` when no face is visible.
    async fn analyze(&self, frame: &VideoFrame) -> MlResult<Option<String>>;
}

/// Describes a frame in a few words.
#[async_trait]
pub trait SceneCaptioner: Send + Sync {
    async fn describe(&self, frame: &VideoFrame) -> MlResult<String>;
}

/// Transcribes the audio track of a clip.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, path: &Path) -> MlResult<Vec<TranscriptSegment>>;
}
