//! Agent-callable tools for parley.
//!
//! Every tool the agent sees is served by the session's MCP server; this
//! crate adapts the server's tool descriptors into the [`Tool`] trait.

pub mod error;
pub mod manager;
pub mod mcp_tool;
pub mod types;

pub use error::{ToolError, ToolResult};
pub use manager::ToolManager;
pub use mcp_tool::McpTool;
pub use types::{Tool, ToolInfo};
