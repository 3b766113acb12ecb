//! Opening MCP sessions from configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{McpServerConfig, McpTransport};
use crate::error::{HarnessError, HarnessResult};
use parley_mcp::{HttpTransport, McpClient, StdioTransport, Transport};

/// Build the transport for `server`.
///
/// # Errors
///
/// Returns an error if the timeout override is unusable, the server process
/// cannot be spawned or the HTTP client cannot be built.
pub async fn open_transport(
    server: &McpServerConfig,
    default_timeout: Duration,
) -> HarnessResult<Arc<dyn Transport>> {
    let timeout = match server.timeout {
        Some(secs) => Duration::try_from_secs_f64(secs).map_err(|e| {
            HarnessError::Config(format!("Bad timeout for MCP server '{}': {e}", server.name))
        })?,
        None => default_timeout,
    };

    let transport: Arc<dyn Transport> = match server.transport {
        McpTransport::Http | McpTransport::StreamableHttp => {
            let url = server.url.clone().unwrap_or_default();
            tracing::info!("Connecting to MCP server {} at {url}", server.name);
            Arc::new(HttpTransport::new(url, &server.request_headers(), timeout)?)
        }
        McpTransport::Stdio => {
            tracing::info!("Starting MCP server {}", server.name);
            Arc::new(StdioTransport::new(&server.command_line(), &server.env).await?)
        }
    };
    Ok(transport)
}

/// Open and initialize a session with `server`.
///
/// A session that fails to initialize is closed before the error is returned.
///
/// # Errors
///
/// Returns an error if the transport cannot be opened or the handshake fails.
pub async fn connect(
    server: &McpServerConfig,
    default_timeout: Duration,
) -> HarnessResult<Arc<McpClient>> {
    let transport = open_transport(server, default_timeout).await?;
    let client = Arc::new(McpClient::new(transport));

    if let Err(e) = client.initialize().await {
        let _ = client.close().await;
        return Err(e.into());
    }
    Ok(client)
}

/// Run `body` with `session`, then close the session whatever `body`
/// returned.
pub async fn scoped<T, F, Fut>(session: Arc<McpClient>, body: F) -> T
where
    F: FnOnce(Arc<McpClient>) -> Fut,
    Fut: Future<Output = T>,
{
    let output = body(session.clone()).await;
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close MCP session: {e}");
    }
    output
}
