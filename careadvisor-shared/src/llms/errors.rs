//! Error types for upstream language-model calls.

use thiserror::Error;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors surfaced by the streaming completion client.
///
/// None of these are retried; a single upstream failure is terminal for the
/// request it belongs to.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The provider answered with a non-success status before any content.
    #[error("upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The provider could not be reached at all.
    #[error("failed to reach model provider: {0}")]
    Connect(String),

    /// The byte stream broke mid-flight.
    #[error("stream error: {0}")]
    Stream(String),

    /// Total streaming duration exceeded the configured deadline.
    #[error("streaming timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// The provider sent something that is not a valid completion chunk.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect(message.into())
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}
