//! Analysis service request/response types.

use serde::{Deserialize, Serialize};

/// A single frame, JPEG encoded and base64 wrapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRequest {
    pub image: String,
    pub width: u32,
    pub height: u32,
}

/// Facial emotion classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionResponse {
    /// Dominant emotion label; absent when no face was found
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_true")]
    pub face_detected: bool,
    #[serde(default)]
    pub confidence: Option<f32>,
}

fn default_true() -> bool {
    true
}

/// Short scene caption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionResponse {
    pub description: String,
}

/// Transcription request for a clip on shared storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub path: String,
}

/// One transcribed segment, in clip-relative seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    #[serde(default)]
    pub end: Option<f64>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
