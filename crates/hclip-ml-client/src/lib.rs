//! Client for the frame and audio analysis service.
//!
//! The emotion classifier, scene captioner and transcriber are opaque models
//! served over HTTP. This crate exposes each of them behind a small async
//! trait so the pipeline can run against fakes in tests.

pub mod analyzer;
pub mod client;
pub mod encode;
pub mod error;
pub mod types;

pub use analyzer::{EmotionAnalyzer, SceneCaptioner, Transcriber};
pub use client::{MlClient, MlClientConfig};
pub use encode::encode_frame_jpeg;
pub use error::{MlError, MlResult};
pub use types::TranscriptSegment;
