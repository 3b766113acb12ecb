//! MCP tool wrapper that implements the Tool trait.

use crate::error::{ToolError, ToolResult};
use crate::types::Tool;
use async_trait::async_trait;
use parley_mcp::{McpClient, RemoteTool};
use std::sync::Arc;

/// A tool served by an MCP server.
pub struct McpTool {
    name: String,
    description: String,
    parameters_schema: serde_json::Value,
    client: Arc<McpClient>,
}

impl McpTool {
    /// Wrap a remote tool descriptor.
    pub fn new(remote_tool: &RemoteTool, client: Arc<McpClient>) -> Self {
        Self {
            name: remote_tool.name.clone(),
            description: remote_tool.description.clone().unwrap_or_default(),
            parameters_schema: remote_tool.input_schema.clone(),
            client,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult<serde_json::Value> {
        // Servers reject `null` arguments; send an empty object instead.
        let args = if args.is_null() {
            serde_json::json!({})
        } else {
            args
        };

        let result = self.client.call_tool(&self.name, args).await?;
        let text = result.text();
        if result.is_error {
            return Err(ToolError::ExecutionFailed(text));
        }
        Ok(serde_json::json!({ "result": text }))
    }
}
