//! Agent events for streaming responses.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent while it answers one query, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The model produced text.
    Assistant(AssistantEvent),
    /// The model asked for a tool call.
    ToolCall(ToolCallEvent),
    /// A tool call finished.
    ToolResult(ToolResultEvent),
}

/// Text from one model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantEvent {
    /// The generated content.
    pub content: String,
}

/// Event for a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEvent {
    /// Name of the tool being called.
    pub tool_name: String,
    /// Arguments passed to the tool.
    pub args: serde_json::Value,
    /// Unique ID for this tool call.
    pub tool_call_id: String,
}

/// Event for a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultEvent {
    /// Name of the tool that was called.
    pub tool_name: String,
    /// Result from the tool (if successful).
    pub result: Option<serde_json::Value>,
    /// Error message (if failed).
    pub error: Option<String>,
    /// Execution duration in seconds.
    pub duration: Option<f64>,
    /// Unique ID for this tool call.
    pub tool_call_id: String,
}
