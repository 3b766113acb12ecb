//! Model Context Protocol (MCP) client for parley.
//!
//! Connects to one MCP server over stdio or streamable HTTP and exposes its
//! resources, prompt templates and tools.

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{McpClient, PROTOCOL_VERSION};
pub use error::{McpError, McpResult};
pub use protocol::{
    GetPromptResult, PromptArgument, PromptDescriptor, ReadResourceResult, RemoteTool,
    ResourceContent, ToolInput, ToolResult,
};
pub use transport::{HttpTransport, StdioTransport, Transport};
