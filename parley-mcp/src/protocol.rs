//! MCP protocol types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<T> {
    /// JSON-RPC version.
    pub jsonrpc: &'static str,
    /// Request ID.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<T>,
}

impl<T> JsonRpcRequest<T> {
    /// Create a new request.
    pub fn new(id: u64, method: impl Into<String>, params: Option<T>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version.
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: String,
}

impl JsonRpcNotification {
    /// Create a new notification.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
        }
    }
}

/// JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T> {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: Option<u64>,
    /// Result (mutually exclusive with error).
    pub result: Option<T>,
    /// Error (mutually exclusive with result).
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional data.
    pub data: Option<serde_json::Value>,
}

/// Server capabilities.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerCapabilities {
    /// Tool capabilities.
    #[serde(default)]
    pub tools: Option<ToolCapabilities>,
    /// Resource capabilities, left opaque.
    #[serde(default)]
    pub resources: Option<serde_json::Value>,
    /// Prompt capabilities, left opaque.
    #[serde(default)]
    pub prompts: Option<serde_json::Value>,
}

/// Tool capabilities.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCapabilities {
    /// Whether the server supports tool listing changes.
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

/// Initialize request params.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeParams {
    /// Protocol version.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Client capabilities.
    pub capabilities: ClientCapabilities,
    /// Client info.
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

/// Client capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientCapabilities {}

/// Client info.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

/// Initialize response result.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    /// Protocol version.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
    /// Server info.
    #[serde(rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Server info.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: Option<String>,
}

/// List tools response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    /// List of available tools.
    pub tools: Vec<RemoteTool>,
}

/// A remote tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTool {
    /// Tool name.
    pub name: String,
    /// Tool description.
    #[serde(default)]
    pub description: Option<String>,
    /// Input schema.
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Tool input for invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInput {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool invocation result.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool execution resulted in an error.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

/// Content from a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    /// Text content.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },
    /// Image content.
    #[serde(rename = "image")]
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Resource content.
    #[serde(rename = "resource")]
    Resource {
        /// Resource content.
        resource: ResourceContent,
    },
}

/// Resource content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    /// Resource URI.
    pub uri: String,
    /// MIME type.
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Binary content (base64).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// `resources/read` params.
#[derive(Debug, Clone, Serialize)]
pub struct ReadResourceParams {
    /// Resource URI.
    pub uri: String,
}

/// `resources/read` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadResourceResult {
    /// Resource contents, possibly empty.
    #[serde(default)]
    pub contents: Vec<ResourceContent>,
}

/// `prompts/list` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPromptsResult {
    /// Prompt catalog.
    #[serde(default)]
    pub prompts: Vec<PromptDescriptor>,
}

/// A prompt template offered by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDescriptor {
    /// Prompt name, unique within the server.
    pub name: String,
    /// Human readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Declared arguments, in display order.
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

/// A declared prompt argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Argument description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the server requires it.
    #[serde(default)]
    pub required: bool,
}

/// `prompts/get` params.
#[derive(Debug, Clone, Serialize)]
pub struct GetPromptParams {
    /// Prompt name.
    pub name: String,
    /// Argument values. Always strings on the wire.
    pub arguments: BTreeMap<String, String>,
}

/// `prompts/get` result.
#[derive(Debug, Clone, Deserialize)]
pub struct GetPromptResult {
    /// Description of the rendered prompt.
    #[serde(default)]
    pub description: Option<String>,
    /// Rendered messages.
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

/// One rendered prompt message.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMessage {
    /// Speaker role (`user` or `assistant`).
    #[serde(default)]
    pub role: Option<String>,
    /// Message content.
    pub content: PromptContent,
}

/// Prompt message content.
///
/// Servers send a bare string, a single content block or a list of blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PromptContent {
    /// Plain string content.
    Text(String),
    /// A single content block.
    Block(ToolContent),
    /// Several content blocks.
    Blocks(Vec<ToolContent>),
}

impl PromptContent {
    /// Flatten the content to text. Blocks are joined with a single space.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Block(block) => block.text(),
            Self::Blocks(blocks) => blocks
                .iter()
                .map(ToolContent::text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl GetPromptResult {
    /// Text of the first rendered message, or `None` when the server
    /// rendered nothing.
    pub fn text(&self) -> Option<String> {
        self.messages.first().map(|m| m.content.text())
    }
}

impl ToolContent {
    /// Text of this block. Non-text blocks render as a short placeholder.
    pub fn text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Image { mime_type, .. } => format!("[image: {mime_type}]"),
            Self::Resource { resource } => resource
                .text
                .clone()
                .unwrap_or_else(|| format!("[resource: {}]", resource.uri)),
        }
    }
}

impl ToolResult {
    /// Get the text content from the result.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
