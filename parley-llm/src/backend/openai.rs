//! OpenAI-compatible API backend.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{Backend, ChunkStream, CompletionOptions, ModelConfig, ProviderConfig};
use crate::error::{LlmError, LlmResult};
use crate::types::{
    AvailableTool, FunctionCall, LlmChunk, LlmMessage, LlmUsage, Role, ToolCall, ToolChoice,
    merge_tool_calls,
};

/// Backend for any server implementing `POST {api_base}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    provider: ProviderConfig,
}

impl OpenAiBackend {
    /// Create a new backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(provider: ProviderConfig, timeout: Duration) -> LlmResult<Self> {
        if provider.api_base.is_empty() {
            return Err(LlmError::InvalidConfig(format!(
                "provider '{}' has no api_base",
                provider.name
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::RequestFailed)?;

        Ok(Self { client, provider })
    }

    fn build_headers(&self, extra: Option<&HashMap<String, String>>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &self.provider.api_key
            && let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}"))
        {
            headers.insert(AUTHORIZATION, val);
        }

        for (key, value) in extra.into_iter().flatten() {
            if let (Ok(name), Ok(val)) =
                (HeaderName::try_from(key.as_str()), HeaderValue::from_str(value))
            {
                headers.insert(name, val);
            }
        }

        headers
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.provider.api_base.trim_end_matches('/')
        )
    }

    fn request<'a>(
        model: &'a ModelConfig,
        messages: &[LlmMessage],
        tools: Option<&[AvailableTool]>,
        options: &CompletionOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &model.name,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            tools: tools
                .filter(|t| !t.is_empty())
                .map(|t| t.to_vec()),
            tool_choice: tools
                .filter(|t| !t.is_empty())
                .and(options.tool_choice),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn post(
        &self,
        request: &ChatRequest<'_>,
        options: &CompletionOptions,
    ) -> LlmResult<reqwest::Response> {
        tracing::debug!(
            "POST {} ({} messages, stream={})",
            self.endpoint(),
            request.messages.len(),
            request.stream
        );

        let response = self
            .client
            .post(self.endpoint())
            .headers(self.build_headers(options.extra_headers.as_ref()))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("{} returned {status}", self.provider.name);
            return Err(LlmError::ApiError {
                provider: self.provider.name.clone(),
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AvailableTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&LlmMessage> for WireMessage {
    fn from(msg: &LlmMessage) -> Self {
        // Assistant turns that only call tools must not carry empty content.
        let content = match (&msg.content, &msg.tool_calls) {
            (Some(c), Some(_)) if c.is_empty() => None,
            (content, _) => content.clone(),
        };

        Self {
            role: msg.role,
            content,
            tool_calls: msg
                .tool_calls
                .as_ref()
                .map(|calls| calls.iter().map(WireToolCall::from).collect()),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    #[serde(default)]
    function: WireFunctionCall,
    #[serde(skip_serializing, default)]
    index: Option<usize>,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone().unwrap_or_default(),
            kind: function_type(),
            function: WireFunctionCall {
                name: call.function.name.clone().unwrap_or_default(),
                arguments: call.function.arguments.clone().unwrap_or_default(),
            },
            index: call.index,
        }
    }
}

impl From<&WireToolCall> for ToolCall {
    fn from(call: &WireToolCall) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            id: non_empty(&call.id),
            index: call.index,
            function: FunctionCall {
                name: non_empty(&call.function.name),
                arguments: non_empty(&call.function.arguments),
            },
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireFunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    delta: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default, deserialize_with = "deserialize_content")]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

impl ResponseMessage {
    fn into_message(self) -> LlmMessage {
        let tool_calls = self
            .tool_calls
            .map(|calls| calls.iter().map(ToolCall::from).collect::<Vec<_>>())
            .filter(|calls| !calls.is_empty());
        match tool_calls {
            Some(calls) => LlmMessage::assistant_with_tool_calls(self.content, calls),
            None => LlmMessage {
                content: self.content,
                ..LlmMessage::assistant("")
            },
        }
    }
}

/// Content arrives as a string, `null`, or a list of `{"type":"text","text":..}` parts.
fn deserialize_content<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Content {
        Text(String),
        Parts(Vec<serde_json::Value>),
    }

    Ok(match Option::<Content>::deserialize(deserializer)? {
        None => None,
        Some(Content::Text(text)) => Some(text),
        Some(Content::Parts(parts)) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect();
            (!texts.is_empty()).then(|| texts.join("\n"))
        }
    })
}

/// Drain every complete SSE line from `buffer` and fold the deltas into one
/// chunk. An incomplete trailing line stays in the buffer for the next read,
/// so multi-byte characters split across network reads are decoded whole.
fn drain_sse(buffer: &mut Vec<u8>) -> LlmChunk {
    let mut content = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    let mut finish_reason = None;
    let mut usage = None;

    let complete = buffer
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    let raw: Vec<u8> = buffer.drain(..complete).collect();
    let lines = String::from_utf8_lossy(&raw);

    for line in lines.lines() {
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            continue;
        };
        if data == "[DONE]" {
            continue;
        }
        let chunk = match serde_json::from_str::<ChatResponse>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!("Skipping unparsable SSE payload: {e}");
                continue;
            }
        };
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };
        if choice.finish_reason.is_some() {
            finish_reason = choice.finish_reason;
        }
        if let Some(delta) = choice.delta.or(choice.message) {
            if let Some(text) = delta.content {
                content.push_str(&text);
            }
            if let Some(calls) = delta.tool_calls {
                let calls: Vec<ToolCall> = calls.iter().map(ToolCall::from).collect();
                merge_tool_calls(&mut tool_calls, &calls);
            }
        }
    }

    LlmChunk {
        message: LlmMessage {
            role: Role::Assistant,
            content: (!content.is_empty()).then_some(content),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
        },
        finish_reason,
        usage,
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        model: &ModelConfig,
        messages: &[LlmMessage],
        tools: Option<&[AvailableTool]>,
        options: &CompletionOptions,
    ) -> LlmResult<LlmChunk> {
        let request = Self::request(model, messages, tools, options, false);
        let body = self.post(&request, options).await?.text().await?;

        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::ParseError(format!("{e}\nBody: {body}")))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("No choices in response".to_string()))?;
        let message = choice
            .message
            .ok_or_else(|| LlmError::ParseError("No message in choice".to_string()))?;

        Ok(LlmChunk {
            message: message.into_message(),
            finish_reason: choice.finish_reason,
            usage: response.usage,
        })
    }

    async fn complete_streaming(
        &self,
        model: &ModelConfig,
        messages: &[LlmMessage],
        tools: Option<&[AvailableTool]>,
        options: &CompletionOptions,
    ) -> LlmResult<ChunkStream> {
        let request = Self::request(model, messages, tools, options, true);
        let response = self.post(&request, options).await?;

        let stream = response
            .bytes_stream()
            .scan(Vec::new(), |buffer, item| {
                let chunk = item.map_err(LlmError::RequestFailed).map(|bytes| {
                    buffer.extend_from_slice(&bytes);
                    drain_sse(buffer)
                });
                futures::future::ready(Some(chunk))
            });

        Ok(Box::pin(stream))
    }
}
