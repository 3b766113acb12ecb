//! Core types for LLM communication.

use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// Operator input.
    User,
    /// Model output.
    Assistant,
    /// Result of a tool call.
    Tool,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function call request from the model.
///
/// Both fields are optional because streamed deltas carry them piecemeal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to call.
    #[serde(default)]
    pub name: Option<String>,
    /// JSON-encoded arguments, possibly partial while streaming.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// A tool call request from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id, echoed back in the tool response.
    #[serde(default)]
    pub id: Option<String>,
    /// Position in the batch; used to merge streamed deltas.
    #[serde(default)]
    pub index: Option<usize>,
    /// The function to call.
    #[serde(default)]
    pub function: FunctionCall,
}

impl ToolCall {
    /// Build a complete call.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            index: None,
            function: FunctionCall {
                name: Some(name.into()),
                arguments: Some(arguments.into()),
            },
        }
    }

    /// Fold a streamed delta into this call.
    ///
    /// The first non-empty id and name win; argument fragments are appended.
    pub fn absorb(&mut self, delta: &Self) {
        fn first_non_empty(slot: &mut Option<String>, incoming: Option<&String>) {
            if slot.as_deref().is_none_or(str::is_empty)
                && let Some(value) = incoming.filter(|v| !v.is_empty())
            {
                *slot = Some(value.clone());
            }
        }

        first_non_empty(&mut self.id, delta.id.as_ref());
        first_non_empty(&mut self.function.name, delta.function.name.as_ref());
        if let Some(fragment) = delta.function.arguments.as_deref().filter(|a| !a.is_empty()) {
            self.function
                .arguments
                .get_or_insert_with(String::new)
                .push_str(fragment);
        }
    }
}

/// Merge streamed tool call deltas into `accumulated`, keyed by index.
pub fn merge_tool_calls(accumulated: &mut Vec<ToolCall>, deltas: &[ToolCall]) {
    for delta in deltas {
        let index = delta.index.unwrap_or(0);
        match accumulated.iter_mut().find(|tc| tc.index == Some(index)) {
            Some(existing) => existing.absorb(delta),
            None => {
                let mut fresh = delta.clone();
                fresh.index = Some(index);
                accumulated.push(fresh);
            }
        }
    }
}

/// A message in the LLM conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Content of the message.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message responds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl LlmMessage {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// System message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Assistant message without tool calls.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(content.into()))
    }

    /// Assistant message carrying tool calls.
    #[must_use]
    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// Response to the tool call `tool_call_id`.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, Some(content.into()))
        }
    }

    /// Content as `&str`, empty when absent.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Number of tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Number of tokens in the completion.
    #[serde(default)]
    pub completion_tokens: u32,
}

/// A chunk of LLM response (used for streaming and non-streaming).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmChunk {
    /// The message content.
    pub message: LlmMessage,
    /// Reason for finishing (if complete).
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Token usage (typically only in final chunk).
    #[serde(default)]
    pub usage: Option<LlmUsage>,
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableFunction {
    /// Name of the function.
    pub name: String,
    /// What the function does.
    pub description: String,
    /// JSON Schema for the parameters.
    pub parameters: serde_json::Value,
}

/// A tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableTool {
    /// Always `"function"`.
    pub r#type: String,
    /// The function definition.
    pub function: AvailableFunction,
}

impl AvailableTool {
    /// Create a new function tool.
    #[must_use]
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            r#type: "function".to_string(),
            function: AvailableFunction {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Tool choice directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Let the model decide.
    #[default]
    Auto,
    /// Never call tools.
    None,
    /// Must call a tool.
    Required,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> ToolCall {
        ToolCall {
            id: id.map(str::to_string),
            index: Some(index),
            function: FunctionCall {
                name: name.map(str::to_string),
                arguments: Some(args.to_string()),
            },
        }
    }

    #[test]
    fn streamed_deltas_merge_by_index() {
        let mut calls = Vec::new();
        merge_tool_calls(
            &mut calls,
            &[
                delta(0, Some("call_1"), Some("add"), "{\"a\":"),
                delta(1, Some("call_2"), Some("multiply"), ""),
            ],
        );
        merge_tool_calls(&mut calls, &[delta(0, None, None, " 1, \"b\": 2}")]);

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(calls[0].function.name.as_deref(), Some("add"));
        assert_eq!(calls[0].function.arguments.as_deref(), Some("{\"a\": 1, \"b\": 2}"));
        assert_eq!(calls[1].function.name.as_deref(), Some("multiply"));
    }

    #[test]
    fn tool_message_carries_call_id() {
        let msg = LlmMessage::tool("call_1", "3");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.text(), "3");
    }
}
