//! Core types for the tool system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolResult;

/// Information about a tool, as offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool parameters.
    pub parameters: serde_json::Value,
}

/// Something the agent can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of the tool.
    fn name(&self) -> &str;

    /// Get a description of what the tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for the tool parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Get information about this tool.
    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// Execute the tool with the given arguments.
    ///
    /// # Arguments
    ///
    /// * `args` - JSON object matching [`parameters_schema`](Self::parameters_schema)
    ///
    /// # Returns
    ///
    /// A JSON value containing the tool result.
    async fn execute(&self, args: serde_json::Value) -> ToolResult<serde_json::Value>;
}
