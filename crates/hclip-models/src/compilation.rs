//! Compilation run models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ClipId;

/// A transcript segment carried along with a viral clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Offset inside the clip, in seconds
    pub offset_secs: f64,
    pub text: String,
}

/// A viral clip waiting in the pending compilation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationEntry {
    pub clip_id: ClipId,
    /// Path of the producer-written clip
    pub path: PathBuf,
    /// Representative scene caption
    pub description: String,
    /// Peak emotion moment inside the clip
    pub peak_offset_secs: f64,
    /// Clip duration reported by the guard
    pub duration_secs: f64,
    /// Transcript lines, in clip-relative time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<TranscriptLine>,
}

/// Sidecar written next to every compiled highlight file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationManifest {
    pub output: PathBuf,
    pub created_at: DateTime<Utc>,
    pub total_duration_secs: f64,
    pub clips: Vec<CompilationEntry>,
}

impl CompilationManifest {
    pub fn new(output: impl Into<PathBuf>, clips: Vec<CompilationEntry>) -> Self {
        let total_duration_secs = clips.iter().map(|c| c.duration_secs).sum();
        Self {
            output: output.into(),
            created_at: Utc::now(),
            total_duration_secs,
            clips,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, duration_secs: f64) -> CompilationEntry {
        CompilationEntry {
            clip_id: ClipId::from(name),
            path: PathBuf::from(format!("/clips/{}", name)),
            description: "crowd goes wild".to_string(),
            peak_offset_secs: 1.0,
            duration_secs,
            transcript: Vec::new(),
        }
    }

    #[test]
    fn test_manifest_total_duration() {
        let manifest = CompilationManifest::new(
            "/out/viral_compilation.mp4",
            vec![entry("clip_001.mp4", 6.0), entry("clip_002.mp4", 5.5)],
        );
        assert!((manifest.total_duration_secs - 11.5).abs() < f64::EPSILON);
        assert_eq!(manifest.clips.len(), 2);
    }

    #[test]
    fn test_entry_skips_empty_transcript() {
        let json = serde_json::to_value(entry("clip_003.mp4", 6.0)).unwrap();
        assert!(json.get("transcript").is_none());
    }
}
