//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// File not yet stable, socket hiccup; retried within a bounded wait
    #[error("Transient I/O failure: {0}")]
    Transient(String),

    /// The decoder cannot open or read the clip; never retried
    #[error("Corrupt input: {0}")]
    CorruptInput(String),

    /// A single analyzer sample failed; the worker keeps going
    #[error("Analyzer failed: {0}")]
    Analyzer(String),

    /// The chat session is gone; the process should stop
    #[error("Chat connection lost: {0}")]
    FatalConnection(String),

    /// Reported once, then the pending run is discarded
    #[error("Concatenation failed: {0}")]
    Concatenation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] hclip_media::MediaError),

    #[error("Chat error: {0}")]
    Chat(#[from] hclip_chat::ChatError),

    #[error("ML service error: {0}")]
    Ml(#[from] hclip_ml_client::MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn corrupt_input(msg: impl Into<String>) -> Self {
        Self::CorruptInput(msg.into())
    }

    pub fn analyzer(msg: impl Into<String>) -> Self {
        Self::Analyzer(msg.into())
    }

    pub fn fatal_connection(msg: impl Into<String>) -> Self {
        Self::FatalConnection(msg.into())
    }

    pub fn concatenation(msg: impl Into<String>) -> Self {
        Self::Concatenation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Transient(_) | WorkerError::Io(_) => true,
            WorkerError::Media(e) => !e.is_corrupt_input(),
            WorkerError::Ml(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The clip itself is unusable.
    pub fn is_corrupt_input(&self) -> bool {
        match self {
            WorkerError::CorruptInput(_) => true,
            WorkerError::Media(e) => e.is_corrupt_input(),
            _ => false,
        }
    }

    /// Must reach the top level and end the process.
    pub fn is_fatal(&self) -> bool {
        match self {
            WorkerError::FatalConnection(_) | WorkerError::Config(_) => true,
            WorkerError::Chat(e) => e.is_fatal(),
            _ => false,
        }
    }
}
