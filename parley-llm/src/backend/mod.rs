//! LLM backend implementations.

mod factory;
mod openai;

pub use factory::{BackendFactory, BackendType};
pub use openai::OpenAiBackend;

use async_trait::async_trait;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;

use crate::error::LlmResult;
use crate::types::{AvailableTool, LlmChunk, LlmMessage, ToolChoice};

/// Sampling settings for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Model identifier sent to the provider.
    pub name: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Cap on generated tokens, provider default when `None`.
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    /// Model with default sampling.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            temperature: 0.2,
            max_tokens: None,
        }
    }
}

/// Connection settings for a provider.
///
/// The API key is resolved by the caller; backends never read the
/// environment themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Provider name, used in error messages.
    pub name: String,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    /// Bearer token, if the provider needs one.
    pub api_key: Option<String>,
    /// Backend type to use.
    pub backend: BackendType,
}

/// Options for a completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Tool choice directive.
    pub tool_choice: Option<ToolChoice>,
    /// Extra headers to include.
    pub extra_headers: Option<HashMap<String, String>>,
}

/// Type alias for boxed stream of chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = LlmResult<LlmChunk>> + Send>>;

/// Trait for LLM backends.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Complete a chat conversation.
    async fn complete(
        &self,
        model: &ModelConfig,
        messages: &[LlmMessage],
        tools: Option<&[AvailableTool]>,
        options: &CompletionOptions,
    ) -> LlmResult<LlmChunk>;

    /// Complete a chat conversation with streaming.
    ///
    /// Each item carries the content and tool call deltas that arrived
    /// together; callers merge tool calls with
    /// [`merge_tool_calls`](crate::types::merge_tool_calls).
    async fn complete_streaming(
        &self,
        model: &ModelConfig,
        messages: &[LlmMessage],
        tools: Option<&[AvailableTool]>,
        options: &CompletionOptions,
    ) -> LlmResult<ChunkStream>;
}
