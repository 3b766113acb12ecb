//! Tool registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ToolError, ToolResult};
use crate::mcp_tool::McpTool;
use crate::types::{Tool, ToolInfo};
use parley_mcp::{McpClient, RemoteTool};

/// Tools available to the agent, keyed by name.
#[derive(Default)]
pub struct ToolManager {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if self.tools.insert(tool.name().to_string(), tool.clone()).is_some() {
            tracing::warn!("Tool '{}' registered twice; keeping the last", tool.name());
        }
    }

    /// Register every tool an MCP server advertised. Returns how many were added.
    pub fn register_mcp_tools(
        &mut self,
        client: Arc<McpClient>,
        remote_tools: Vec<RemoteTool>,
    ) -> usize {
        let count = remote_tools.len();
        for remote in &remote_tools {
            self.register(Arc::new(McpTool::new(remote, client.clone())));
        }
        tracing::info!("Registered {count} MCP tools");
        count
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> ToolResult<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Names of all registered tools, sorted.
    pub fn available_tools(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Descriptions of all registered tools, sorted by name.
    pub fn tool_infos(&self) -> Vec<ToolInfo> {
        self.tools.values().map(|tool| tool.info()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
