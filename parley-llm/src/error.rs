//! Error types for LLM operations.

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed before a response arrived.
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("{provider} API error ({status}): {message}")]
    ApiError {
        /// Provider name.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Streaming error.
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;
