//! Core agent implementation.
//!
//! The agent runs a ReAct-style loop: send the conversation to the model,
//! execute any tool calls it asks for, append the results and ask again,
//! until the model answers without calling a tool. Events are sent on a
//! channel as they happen so the caller can render them while the loop runs.

use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::ParleyConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::events::{AgentEvent, AssistantEvent, ToolCallEvent, ToolResultEvent};
use parley_llm::backend::{Backend, BackendFactory, CompletionOptions, ModelConfig};
use parley_llm::{AvailableTool, LlmMessage, ToolCall, ToolChoice, merge_tool_calls};
use parley_tools::{ToolError, ToolManager};

/// Tag wrapped around tool failures reported back to the model.
pub const TOOL_ERROR_TAG: &str = "tool_error";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the available tools \
whenever they help answer the user's question, and answer plainly when they do not.";

/// The main agent that coordinates LLM and tools.
pub struct Agent {
    backend: Arc<dyn Backend>,
    model: ModelConfig,
    tool_manager: ToolManager,
    tools: Vec<AvailableTool>,
    messages: Vec<LlmMessage>,
    stream: bool,
    max_turns: usize,
}

impl Agent {
    /// Create an agent for the configured active model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model, provider or API key is missing, or the
    /// backend cannot be created.
    pub fn new(config: &ParleyConfig, tool_manager: ToolManager) -> HarnessResult<Self> {
        let model = config.get_active_model()?;
        let provider = config.get_provider_for_model(model)?;
        let backend = BackendFactory::create(
            &provider.backend_config()?,
            Duration::from_secs_f64(config.api_timeout),
        )?;

        tracing::info!("Using model {} via {}", model.name, provider.name);
        Self::from_backend(config, tool_manager, backend)
    }

    /// Create an agent using a pre-constructed backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the active model is not configured.
    pub fn from_backend(
        config: &ParleyConfig,
        tool_manager: ToolManager,
        backend: Arc<dyn Backend>,
    ) -> HarnessResult<Self> {
        let model = config.get_active_model()?.backend_config();
        let tools = tool_manager
            .tool_infos()
            .into_iter()
            .map(|info| AvailableTool::function(info.name, info.description, info.parameters))
            .collect();
        let system_prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        Ok(Self {
            backend,
            model,
            tool_manager,
            tools,
            messages: vec![LlmMessage::system(system_prompt)],
            stream: config.stream,
            max_turns: config.max_turns,
        })
    }

    /// Conversation so far, starting with the system prompt.
    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    /// Names of the tools offered to the model.
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_manager.available_tools()
    }

    /// Answer one user message, sending events to `event_tx` as they happen.
    ///
    /// Prior turns stay in the conversation. If the exchange fails, the
    /// conversation is rolled back to where it was before `user_message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model request fails or a tool call breaks the
    /// MCP session ([`HarnessError::is_fatal`]).
    pub async fn act(
        &mut self,
        user_message: &str,
        event_tx: mpsc::Sender<AgentEvent>,
    ) -> HarnessResult<()> {
        let checkpoint = self.messages.len();
        self.messages.push(LlmMessage::user(user_message));

        let result = self.conversation_loop(&event_tx).await;
        if result.is_err() {
            self.messages.truncate(checkpoint);
        }
        result
    }

    async fn conversation_loop(&mut self, tx: &mpsc::Sender<AgentEvent>) -> HarnessResult<()> {
        for turn in 1..=self.max_turns {
            let message = self.perform_llm_turn().await?;

            let content = message.text().trim().to_string();
            if !content.is_empty() {
                let _ = tx
                    .send(AgentEvent::Assistant(AssistantEvent { content }))
                    .await;
            }

            let tool_calls = message.tool_calls.clone().unwrap_or_default();
            self.messages.push(message);

            if tool_calls.is_empty() {
                return Ok(());
            }

            tracing::debug!("Turn {turn}: {} tool call(s)", tool_calls.len());
            for call in &tool_calls {
                self.handle_tool_call(call, tx).await?;
            }
        }

        tracing::warn!("Stopped after {} model turns", self.max_turns);
        let _ = tx
            .send(AgentEvent::Assistant(AssistantEvent {
                content: format!(
                    "Stopped after {} model turns without a final answer.",
                    self.max_turns
                ),
            }))
            .await;
        Ok(())
    }

    /// One model request. Streaming and non-streaming both yield the whole
    /// assistant message; streamed tool call fragments are merged by index.
    async fn perform_llm_turn(&self) -> HarnessResult<LlmMessage> {
        let tools = (!self.tools.is_empty()).then_some(self.tools.as_slice());
        let options = CompletionOptions {
            tool_choice: Some(ToolChoice::Auto),
            ..Default::default()
        };

        if !self.stream {
            let chunk = self
                .backend
                .complete(&self.model, &self.messages, tools, &options)
                .await?;
            return Ok(with_call_ids(chunk.message));
        }

        let mut stream = self
            .backend
            .complete_streaming(&self.model, &self.messages, tools, &options)
            .await?;

        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(text) = &chunk.message.content {
                content.push_str(text);
            }
            if let Some(deltas) = &chunk.message.tool_calls {
                merge_tool_calls(&mut tool_calls, deltas);
            }
        }

        let message = if tool_calls.is_empty() {
            LlmMessage::assistant(content)
        } else {
            LlmMessage::assistant_with_tool_calls(Some(content), tool_calls)
        };
        Ok(with_call_ids(message))
    }

    async fn handle_tool_call(
        &mut self,
        call: &ToolCall,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> HarnessResult<()> {
        let tool_name = call.function.name.clone().unwrap_or_default();
        let tool_call_id = call.id.clone().unwrap_or_default();
        let args = call
            .function
            .arguments
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .map_or(Ok(serde_json::json!({})), serde_json::from_str);

        let _ = tx
            .send(AgentEvent::ToolCall(ToolCallEvent {
                tool_name: tool_name.clone(),
                args: args.as_ref().cloned().unwrap_or_default(),
                tool_call_id: tool_call_id.clone(),
            }))
            .await;

        let start = Instant::now();
        let outcome = match args {
            Ok(args) => self.execute_tool(&tool_name, args).await,
            Err(e) => Err(ToolError::InvalidArguments(e.to_string())),
        };
        let duration = Some(start.elapsed().as_secs_f64());

        let (result, error, reply) = match outcome {
            Ok(value) => {
                let reply = format_tool_output(&value);
                (Some(value), None, reply)
            }
            Err(e) if e.is_fatal() => {
                tracing::warn!("Tool {tool_name} broke the MCP session: {e}");
                return Err(HarnessError::Tool(e));
            }
            Err(e) => {
                let message = e.to_string();
                let reply =
                    format!("<{TOOL_ERROR_TAG}>{tool_name} failed: {message}</{TOOL_ERROR_TAG}>");
                (None, Some(message), reply)
            }
        };

        let _ = tx
            .send(AgentEvent::ToolResult(ToolResultEvent {
                tool_name,
                result,
                error,
                duration,
                tool_call_id: tool_call_id.clone(),
            }))
            .await;

        self.messages.push(LlmMessage::tool(tool_call_id, reply));
        Ok(())
    }

    async fn execute_tool(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let tool = self.tool_manager.get(tool_name)?;
        tracing::debug!("Calling tool {tool_name} with {args}");
        tool.execute(args).await
    }
}

/// Give every tool call an id so results can be matched to calls.
fn with_call_ids(mut message: LlmMessage) -> LlmMessage {
    for call in message.tool_calls.iter_mut().flatten() {
        if call.id.as_deref().is_none_or(str::is_empty) {
            call.id = Some(format!("call_{}", Uuid::new_v4().simple()));
        }
    }
    message
}

/// Render a tool result for the model: objects become `key: value` lines.
fn format_tool_output(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{k}: {s}"),
                serde_json::Value::Null => format!("{k}: "),
                other => format!("{k}: {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_output_is_flattened_to_lines() {
        assert_eq!(format_tool_output(&json!({"result": "5"})), "result: 5");
        assert_eq!(format_tool_output(&json!({"n": 2, "x": null})), "n: 2\nx: ");
        assert_eq!(format_tool_output(&json!("plain")), "plain");
    }

    #[test]
    fn missing_call_ids_are_generated() {
        let message = with_call_ids(LlmMessage::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("", "add", "{}"), ToolCall::new("keep", "add", "{}")],
        ));
        let calls = message.tool_calls.unwrap();
        assert!(calls[0].id.as_deref().unwrap().starts_with("call_"));
        assert_eq!(calls[1].id.as_deref(), Some("keep"));
    }
}
