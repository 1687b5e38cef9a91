//! Viral verdict model.

use serde::{Deserialize, Serialize};

/// Minimum share of emotion samples the dominant emotion must hold.
pub const VIRAL_THRESHOLD: f64 = 0.30;

/// Label excluded when picking the dominant emotion.
pub const NEUTRAL_LABEL: &str = "neutral";

/// Description used when a clip has no scene captions.
pub const UNKNOWN_SCENE: &str = "Unknown scene";

/// Reduction of a clip's analysis events into a single decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViralVerdict {
    pub is_viral: bool,
    /// Most frequent non-neutral emotion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_emotion: Option<String>,
    /// Dominant count over all emotion samples (neutral included)
    pub ratio: f64,
    /// Representative scene caption
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Median offset of the dominant emotion samples
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_offset_secs: Option<f64>,
}

impl ViralVerdict {
    /// Verdict for a clip without any non-neutral emotion sample.
    pub fn not_viral() -> Self {
        Self {
            is_viral: false,
            dominant_emotion: None,
            ratio: 0.0,
            description: None,
            peak_offset_secs: None,
        }
    }
}

impl Default for ViralVerdict {
    fn default() -> Self {
        Self::not_viral()
    }
}
