//! Shared data models for the HypeClip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Clip identity and per-clip lifecycle stages
//! - Analysis events emitted by the analyzer workers
//! - Viral verdicts computed from those events
//! - Chat hype transitions and windows
//! - Compilation runs and their manifests

pub mod clip;
pub mod compilation;
pub mod event;
pub mod frame;
pub mod hype;
pub mod timestamp;
pub mod verdict;

// Re-export common types
pub use clip::{ClipId, ClipOutcome, ClipStage};
pub use compilation::{CompilationEntry, CompilationManifest, TranscriptLine};
pub use event::{AnalysisEvent, AnalysisKind};
pub use frame::VideoFrame;
pub use hype::{HypeTransition, HypeWindow};
pub use verdict::{ViralVerdict, NEUTRAL_LABEL, UNKNOWN_SCENE, VIRAL_THRESHOLD};
