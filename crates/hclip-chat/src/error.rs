//! Chat error types.

use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect to {address}: {message}")]
    Connect { address: String, message: String },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Read timed out after {0} seconds")]
    ReadTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn connection_lost(msg: impl Into<String>) -> Self {
        Self::ConnectionLost(msg.into())
    }

    /// Whether the session is gone and must be surfaced to the caller.
    ///
    /// There is no internal reconnect; a fatal error ends the chat component.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ChatError::ReadTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ChatError::connection_lost("eof").is_fatal());
        assert!(ChatError::config("missing channel").is_fatal());
        assert!(!ChatError::ReadTimeout(300).is_fatal());
    }
}
