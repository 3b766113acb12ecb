//! Error types for the harness.

use parley_llm::LlmError;
use parley_mcp::McpError;
use parley_tools::ToolError;
use thiserror::Error;

/// Errors raised while configuring or running the agent.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// LLM error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// MCP error.
    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing API key.
    #[error("Missing API key for {provider}. Set {env_var} environment variable.")]
    MissingApiKey {
        /// Provider name.
        provider: String,
        /// Environment variable name.
        env_var: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HarnessError {
    /// Whether the MCP session behind this error is broken.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Mcp(e) => e.is_fatal(),
            Self::Tool(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_broken_sessions_are_fatal() {
        let lost = HarnessError::Tool(ToolError::Session(McpError::ConnectionFailed(
            "gone".into(),
        )));
        assert!(lost.is_fatal());

        let rejected = HarnessError::Mcp(McpError::ServerError {
            code: -32602,
            message: "bad params".into(),
        });
        assert!(!rejected.is_fatal());

        let llm = HarnessError::Llm(LlmError::ApiError {
            provider: "openai".into(),
            status: 500,
            message: "oops".into(),
        });
        assert!(!llm.is_fatal());
    }
}
