//! Error types for tool operations.

use parley_mcp::McpError;
use thiserror::Error;

/// Errors that can occur during tool operations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool ran and reported failure.
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    /// Invalid arguments provided.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool not found.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The MCP session behind the tool broke. Not recoverable by retrying.
    #[error("MCP session failed: {0}")]
    Session(#[source] McpError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    /// Whether the failure outlives this call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl From<McpError> for ToolError {
    fn from(error: McpError) -> Self {
        if error.is_fatal() {
            Self::Session(error)
        } else {
            Self::ExecutionFailed(error.to_string())
        }
    }
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
