//! Clip watcher, analysis orchestrator and highlight compiler.
//!
//! This crate provides:
//! - [`ClipEventCorrelator`]: per-clip event storage and viral verdicts
//! - [`Analyzers`]: emotion, scene and transcript workers for one clip
//! - [`ClipOrchestrator`]: the per-clip state machine and compilation runs
//! - [`run_chat`]: the chat task feeding the hype tracker

pub mod analyzers;
pub mod chat;
pub mod compiler;
pub mod config;
pub mod correlator;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;

pub use analyzers::{Analyzers, SamplingConfig};
pub use chat::{monitor_chat, run_chat};
pub use compiler::{Compiler, PendingRun};
pub use config::{HypeGate, WorkerConfig};
pub use correlator::ClipEventCorrelator;
pub use error::{WorkerError, WorkerResult};
pub use logging::ClipLogger;
pub use orchestrator::ClipOrchestrator;
