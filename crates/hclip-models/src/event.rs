//! Analysis events emitted by the per-clip analyzer workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of analyzer that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Emotion,
    Scene,
    Transcript,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Emotion => "emotion",
            AnalysisKind::Scene => "scene",
            AnalysisKind::Transcript => "transcript",
        }
    }

    /// All analyzer kinds, in spawn order.
    pub fn all() -> [AnalysisKind; 3] {
        [AnalysisKind::Emotion, AnalysisKind::Scene, AnalysisKind::Transcript]
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding about a clip.
///
/// Events are immutable once emitted; ownership moves to the correlator
/// through the per-clip channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// Dominant facial emotion detected on a sampled frame.
    Emotion {
        captured_at: DateTime<Utc>,
        video_offset_secs: f64,
        label: String,
    },
    /// Short caption describing a sampled frame.
    Scene {
        captured_at: DateTime<Utc>,
        video_offset_secs: f64,
        description: String,
    },
    /// Transcribed speech segment.
    Transcript {
        captured_at: DateTime<Utc>,
        video_offset_secs: f64,
        text: String,
    },
}

impl AnalysisEvent {
    /// Create an emotion event captured now.
    pub fn emotion(video_offset_secs: f64, label: impl Into<String>) -> Self {
        Self::Emotion {
            captured_at: Utc::now(),
            video_offset_secs,
            label: label.into(),
        }
    }

    /// Create a scene event captured now.
    pub fn scene(video_offset_secs: f64, description: impl Into<String>) -> Self {
        Self::Scene {
            captured_at: Utc::now(),
            video_offset_secs,
            description: description.into(),
        }
    }

    /// Create a transcript event captured now.
    pub fn transcript(video_offset_secs: f64, text: impl Into<String>) -> Self {
        Self::Transcript {
            captured_at: Utc::now(),
            video_offset_secs,
            text: text.into(),
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisEvent::Emotion { .. } => AnalysisKind::Emotion,
            AnalysisEvent::Scene { .. } => AnalysisKind::Scene,
            AnalysisEvent::Transcript { .. } => AnalysisKind::Transcript,
        }
    }

    /// Offset inside the clip the event refers to.
    pub fn video_offset_secs(&self) -> f64 {
        match self {
            AnalysisEvent::Emotion { video_offset_secs, .. }
            | AnalysisEvent::Scene { video_offset_secs, .. }
            | AnalysisEvent::Transcript { video_offset_secs, .. } => *video_offset_secs,
        }
    }

    /// Wall-clock time the analyzer produced the event.
    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            AnalysisEvent::Emotion { captured_at, .. }
            | AnalysisEvent::Scene { captured_at, .. }
            | AnalysisEvent::Transcript { captured_at, .. } => *captured_at,
        }
    }
}
