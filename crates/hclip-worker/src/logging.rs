//! Structured per-clip logging.
//!
//! Every line carries the clip id and its current lifecycle stage so a skip or
//! failure can be diagnosed from the logs alone.

use tracing::{error, info, warn, Span};

use hclip_models::{ClipId, ClipStage};

/// Clip logger with consistent `clip_id` / `stage` fields.
#[derive(Debug, Clone)]
pub struct ClipLogger {
    clip_id: String,
    stage: ClipStage,
}

impl ClipLogger {
    pub fn new(clip_id: &ClipId) -> Self {
        Self {
            clip_id: clip_id.to_string(),
            stage: ClipStage::Discovered,
        }
    }

    /// Move to `stage` and log the transition.
    pub fn enter(&mut self, stage: ClipStage) {
        self.stage = stage;
        info!(
            clip_id = %self.clip_id,
            stage = stage.as_str(),
            "Clip stage: {}", stage.as_str()
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            clip_id = %self.clip_id,
            stage = self.stage.as_str(),
            "Clip progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            clip_id = %self.clip_id,
            stage = self.stage.as_str(),
            "Clip warning: {}", message
        );
    }

    /// Log a skip with the reason; the stage becomes `Skipped`.
    pub fn log_skip(&mut self, reason: &str) {
        let failed_at = self.stage;
        self.stage = ClipStage::Skipped;
        warn!(
            clip_id = %self.clip_id,
            stage = failed_at.as_str(),
            "Clip skipped: {}", reason
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            clip_id = %self.clip_id,
            stage = self.stage.as_str(),
            "Clip error: {}", message
        );
    }

    pub fn clip_id(&self) -> &str {
        &self.clip_id
    }

    pub fn stage(&self) -> ClipStage {
        self.stage
    }

    /// Span carrying the clip id, for instrumenting spawned work.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("clip", clip_id = %self.clip_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tracking() {
        let mut logger = ClipLogger::new(&ClipId::from("clip_004.mp4"));
        assert_eq!(logger.clip_id(), "clip_004.mp4");
        assert_eq!(logger.stage(), ClipStage::Discovered);

        logger.enter(ClipStage::Stabilizing);
        assert_eq!(logger.stage(), ClipStage::Stabilizing);

        logger.log_skip("not ready after 30s");
        assert_eq!(logger.stage(), ClipStage::Skipped);
    }
}
