//! MCP client implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{McpError, McpResult};
use crate::protocol::{
    ClientCapabilities, ClientInfo, GetPromptParams, GetPromptResult, InitializeParams,
    InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListPromptsResult,
    ListToolsResult, PromptDescriptor, ReadResourceParams, ReadResourceResult, RemoteTool,
    ToolInput, ToolResult,
};
use crate::transport::Transport;

/// Protocol revision spoken by this client.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP client for communicating with MCP servers.
///
/// One client owns one session. It is shared behind an `Arc` between the
/// session loop and the tools it exposes to the agent, but requests are
/// never issued concurrently.
pub struct McpClient {
    transport: Arc<dyn Transport>,
    request_id: AtomicU64,
    closed: AtomicBool,
}

impl McpClient {
    /// Create a new MCP client with the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            request_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the next request ID.
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a JSON-RPC request and parse the response.
    async fn request<P: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> McpResult<R> {
        if self.is_closed() {
            return Err(McpError::ConnectionFailed("Session is closed".to_string()));
        }

        let request = JsonRpcRequest::new(self.next_id(), method, params);
        let request_json = serde_json::to_string(&request)?;
        tracing::debug!("MCP -> {request_json}");

        let response_json = self.transport.send(&request_json).await?;
        tracing::debug!("MCP <- {response_json}");
        let response: JsonRpcResponse<R> = serde_json::from_str(&response_json)?;

        if let Some(error) = response.error {
            return Err(McpError::ServerError {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| McpError::ProtocolError("Response missing result".to_string()))
    }

    /// Initialize the connection with the server.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {},
            client_info: ClientInfo {
                name: "parley".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result: InitializeResult = self.request("initialize", Some(params)).await?;

        let notification = JsonRpcNotification::new("notifications/initialized");
        self.transport
            .notify(&serde_json::to_string(&notification)?)
            .await?;

        if let Some(info) = &result.server_info {
            tracing::info!(
                "Connected to MCP server {} {}",
                info.name,
                info.version.as_deref().unwrap_or("")
            );
        }
        Ok(result)
    }

    /// List available tools from the server.
    pub async fn list_tools(&self) -> McpResult<Vec<RemoteTool>> {
        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        Ok(result.tools)
    }

    /// Invoke a tool on the server.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> McpResult<ToolResult> {
        let params = ToolInput {
            name: name.to_string(),
            arguments,
        };

        self.request("tools/call", Some(params)).await
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> McpResult<ReadResourceResult> {
        let params = ReadResourceParams {
            uri: uri.to_string(),
        };
        self.request("resources/read", Some(params)).await
    }

    /// List the server's prompt templates.
    pub async fn list_prompts(&self) -> McpResult<Vec<PromptDescriptor>> {
        let result: ListPromptsResult = self.request("prompts/list", None::<()>).await?;
        Ok(result.prompts)
    }

    /// Render a prompt template with string arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> McpResult<GetPromptResult> {
        let params = GetPromptParams {
            name: name.to_string(),
            arguments: arguments.clone(),
        };
        self.request("prompts/get", Some(params)).await
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the session. Only the first call reaches the transport.
    pub async fn close(&self) -> McpResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Closing MCP session");
        self.transport.close().await
    }
}
