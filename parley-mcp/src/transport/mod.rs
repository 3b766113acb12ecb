//! MCP transport implementations.

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::error::McpResult;
use async_trait::async_trait;

/// Trait for MCP transports.
///
/// A transport carries one session. Requests are strictly sequential: the
/// client never has two requests in flight on the same transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and receive the matching response.
    async fn send(&self, message: &str) -> McpResult<String>;

    /// Send a notification. No response is read.
    async fn notify(&self, message: &str) -> McpResult<()>;

    /// Close the transport.
    async fn close(&self) -> McpResult<()>;
}

/// Extract the JSON-RPC id from an outgoing request.
pub(crate) fn request_id(message: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(message)
        .ok()?
        .get("id")
        .cloned()
}

/// Whether `frame` is the response to the request carrying `id`.
///
/// Server-initiated notifications and requests share the channel with
/// responses, so anything that is not a result or error for `id` is skipped.
pub(crate) fn is_response_to(frame: &serde_json::Value, id: Option<&serde_json::Value>) -> bool {
    let is_response = frame.get("result").is_some() || frame.get("error").is_some();
    match id {
        Some(id) => is_response && frame.get("id") == Some(id),
        None => is_response,
    }
}
