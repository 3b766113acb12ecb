//! Chat-completion backends for parley.
//!
//! The agent talks to models through the [`Backend`] trait. The bundled
//! implementation speaks the OpenAI-compatible `chat/completions` API, which
//! covers hosted providers as well as local servers such as Ollama or vLLM.

pub mod backend;
pub mod error;
pub mod types;

pub use backend::{
    Backend, BackendFactory, BackendType, ChunkStream, CompletionOptions, ModelConfig,
    OpenAiBackend, ProviderConfig,
};
pub use error::{LlmError, LlmResult};
pub use types::{
    AvailableFunction, AvailableTool, FunctionCall, LlmChunk, LlmMessage, LlmUsage, Role,
    ToolCall, ToolChoice, merge_tool_calls,
};
