//! Analysis client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limited by ML service")]
    RateLimited,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    /// Transient failures worth another attempt.
    ///
    /// Rate limiting is not retried: the caller drops the sample and moves on.
    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::ServiceUnavailable(_) | MlError::Timeout(_) => true,
            MlError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
