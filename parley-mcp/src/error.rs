//! Error types for MCP operations.

use thiserror::Error;

/// Errors that can occur during MCP operations.
///
/// The variants fall into two groups. Some describe a single request the
/// server rejected (unknown resource, bad prompt arguments, a tool that
/// reported failure); the session is still usable afterwards. The rest mean
/// the session itself can no longer be trusted. [`McpError::is_fatal`] makes
/// that split available to callers.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to connect to MCP server, or the connection is gone.
    #[error("Failed to connect to MCP server: {0}")]
    ConnectionFailed(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Tool invocation failed.
    #[error("Tool invocation failed: {0}")]
    ToolError(String),

    /// Server returned an error.
    #[error("Server error ({code}): {message}")]
    ServerError {
        /// Error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Timeout waiting for response.
    #[error("Timeout waiting for MCP response")]
    Timeout,

    /// Process spawn error.
    #[error("Failed to spawn process: {0}")]
    ProcessSpawnError(String),
}

impl McpError {
    /// Whether this error leaves the session unusable.
    ///
    /// Errors the server reported about one request, and timeouts on one
    /// request, are recoverable. Broken pipes, undecodable frames and lost
    /// connections are not.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ServerError { .. } | Self::ToolError(_) | Self::Timeout => false,
            Self::HttpError(e) => !(e.is_timeout() || e.is_status()),
            Self::ConnectionFailed(_)
            | Self::JsonError(_)
            | Self::IoError(_)
            | Self::ProtocolError(_)
            | Self::ProcessSpawnError(_) => true,
        }
    }
}

/// Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;
