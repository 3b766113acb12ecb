//! Configuration, MCP session setup and the reasoning agent for parley.
//!
//! The [`Agent`] coordinates a chat-completion backend with the tools served
//! by an MCP server and reports its progress as [`AgentEvent`]s.

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod mcp;
pub mod paths;

pub use agent::{Agent, TOOL_ERROR_TAG};
pub use config::{McpServerConfig, McpTransport, ModelConfig, ParleyConfig, ProviderConfig};
pub use error::{HarnessError, HarnessResult};
pub use events::{AgentEvent, AssistantEvent, ToolCallEvent, ToolResultEvent};
pub use mcp::{connect, scoped};
