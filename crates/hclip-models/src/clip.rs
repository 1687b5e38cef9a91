//! Clip identity and lifecycle models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Unique identifier for a clip (its file name inside the watched directory).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive the clip ID from a clip path (the file name).
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self(name)
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClipId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stage of a clip in the orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipStage {
    /// New file seen in the watched directory
    #[default]
    Discovered,
    /// Waiting for the producer to finish writing
    Stabilizing,
    /// Analyzer workers running
    Analyzing,
    /// Verdict computed
    Verdicted,
    /// Clip written into a compilation
    Compiled,
    /// Clip dropped (warm-up, not ready, corrupt, not viral)
    Skipped,
}

impl ClipStage {
    /// Get the stage as a string for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStage::Discovered => "discovered",
            ClipStage::Stabilizing => "stabilizing",
            ClipStage::Analyzing => "analyzing",
            ClipStage::Verdicted => "verdicted",
            ClipStage::Compiled => "compiled",
            ClipStage::Skipped => "skipped",
        }
    }

    /// Check if the stage is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClipStage::Compiled | ClipStage::Skipped)
    }
}

impl fmt::Display for ClipStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a single clip pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClipOutcome {
    /// First clip seen; ignored as warm-up
    WarmUp,
    /// Guard gave up waiting for the file to settle
    NotReady,
    /// Decoder could not open or read the clip
    Corrupt { reason: String },
    /// Clip joined the pending compilation run
    Viral { description: String, peak_offset_secs: f64 },
    /// Clip verdict was viral but no hype window covered it
    NotHyped,
    /// Clip is not viral
    Regular,
}

impl ClipOutcome {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ClipOutcome::WarmUp => "warm_up",
            ClipOutcome::NotReady => "not_ready",
            ClipOutcome::Corrupt { .. } => "corrupt",
            ClipOutcome::Viral { .. } => "viral",
            ClipOutcome::NotHyped => "not_hyped",
            ClipOutcome::Regular => "regular",
        }
    }

    /// Stage a clip rests in once its pass is over.
    ///
    /// A viral clip only waits in the pending run; it reaches `Compiled`
    /// when that run is written out.
    pub fn stage(&self) -> ClipStage {
        match self {
            ClipOutcome::Viral { .. } => ClipStage::Verdicted,
            _ => ClipStage::Skipped,
        }
    }

    /// Whether this outcome breaks a run of viral clips.
    ///
    /// Warm-up, not-ready and corrupt clips are dropped without a verdict and
    /// leave the pending run untouched.
    pub fn breaks_run(&self) -> bool {
        matches!(self, ClipOutcome::Regular | ClipOutcome::NotHyped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_id_from_path() {
        let id = ClipId::from_path("/data/clips/clip_007.mp4");
        assert_eq!(id.as_str(), "clip_007.mp4");
        assert_eq!(id.to_string(), "clip_007.mp4");
    }

    #[test]
    fn test_outcome_stage_mapping() {
        let viral = ClipOutcome::Viral {
            description: "crowd cheering".to_string(),
            peak_offset_secs: 2.5,
        };
        assert_eq!(viral.stage(), ClipStage::Verdicted);
        assert!(!viral.stage().is_terminal());
        assert!(!viral.breaks_run());
        assert_eq!(ClipOutcome::Regular.stage(), ClipStage::Skipped);
        assert!(ClipOutcome::Regular.breaks_run());
        assert!(!ClipOutcome::NotReady.breaks_run());
        assert!(ClipStage::Skipped.is_terminal());
        assert!(!ClipStage::Analyzing.is_terminal());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&ClipOutcome::Corrupt {
            reason: "moov atom not found".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"outcome\":\"corrupt\""));
    }
}
