//! Streamable HTTP transport for MCP.
//!
//! Every message is a `POST` to a single endpoint. The server answers either
//! with a plain JSON body or with a short SSE stream whose `data:` lines carry
//! JSON-RPC frames. A session id handed out in the `Mcp-Session-Id` header is
//! echoed on every later request and released with a `DELETE` on close.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{Transport, is_response_to, request_id};
use crate::error::{McpError, McpResult};

const SESSION_HEADER: &str = "mcp-session-id";

/// HTTP transport for MCP servers.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    session_id: RwLock<Option<String>>,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    ///
    /// # Arguments
    ///
    /// * `url` - Endpoint URL of the MCP server
    /// * `headers` - Additional headers to include
    /// * `timeout` - Request timeout
    pub fn new(
        url: impl Into<String>,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> McpResult<Self> {
        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        header_map.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );

        for (key, value) in headers {
            match (HeaderName::try_from(key.as_str()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(val)) => {
                    header_map.insert(name, val);
                }
                _ => tracing::warn!("Ignoring invalid MCP header: {key}"),
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(timeout)
            .build()
            .map_err(McpError::HttpError)?;

        Ok(Self {
            client,
            url: url.into(),
            session_id: RwLock::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    async fn post(&self, message: &str) -> McpResult<reqwest::Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionFailed("Transport is closed".to_string()));
        }

        let mut request = self.client.post(&self.url).body(message.to_string());
        if let Some(id) = self.session_id() {
            request = request.header(SESSION_HEADER, id);
        }
        let response = request.send().await?;

        if let Some(id) = response.headers().get(SESSION_HEADER)
            && let Ok(id) = id.to_str()
        {
            let mut slot = self.session_id.write();
            if slot.as_deref() != Some(id) {
                tracing::debug!("MCP session id: {id}");
                *slot = Some(id.to_string());
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::ServerError {
                code: i32::from(status.as_u16()),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }

        Ok(response)
    }
}

/// Pull the response to `id` out of an SSE body.
fn response_from_sse(body: &str, id: Option<&serde_json::Value>) -> Option<String> {
    let mut found = None;
    for event in body.split("\n\n") {
        let data = event
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join("\n");
        if data.is_empty() {
            continue;
        }
        if let Ok(frame) = serde_json::from_str::<serde_json::Value>(&data)
            && is_response_to(&frame, id)
        {
            found = Some(data);
        }
    }
    found
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: &str) -> McpResult<String> {
        let response = self.post(message).await?;

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        let body = response.text().await?;

        if !is_sse {
            return Ok(body);
        }

        let normalized = body.replace("\r\n", "\n");
        response_from_sse(&normalized, request_id(message).as_ref()).ok_or_else(|| {
            McpError::ProtocolError("Event stream ended without a response".to_string())
        })
    }

    async fn notify(&self, message: &str) -> McpResult<()> {
        self.post(message).await?;
        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let Some(id) = self.session_id() else {
            return Ok(());
        };

        // Servers may refuse explicit termination; that is not an error.
        match self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, id)
            .send()
            .await
        {
            Ok(response) => tracing::debug!("MCP session released: {}", response.status()),
            Err(e) => tracing::warn!("Failed to release MCP session: {e}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    #[derive(Debug)]
    struct Seen {
        method: String,
        session: Option<String>,
        body: String,
    }

    fn reply(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut out = format!("HTTP/1.1 {status}\r\n");
        for (name, value) in headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ));
        out
    }

    /// Answer one request per connection with the next canned reply, and
    /// hand back what was received once the replies run out.
    async fn responder(replies: Vec<String>) -> (String, JoinHandle<Vec<Seen>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/mcp", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for reply in replies {
                let (stream, _) = listener.accept().await.unwrap();
                let mut stream = BufReader::new(stream);

                let mut request_line = String::new();
                stream.read_line(&mut request_line).await.unwrap();
                let method = request_line.split_whitespace().next().unwrap().to_string();

                let mut session = None;
                let mut length = 0;
                loop {
                    let mut line = String::new();
                    stream.read_line(&mut line).await.unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    let (name, value) = line.split_once(':').unwrap();
                    match name.to_ascii_lowercase().as_str() {
                        "content-length" => length = value.trim().parse().unwrap(),
                        SESSION_HEADER => session = Some(value.trim().to_string()),
                        _ => {}
                    }
                }

                let mut body = vec![0; length];
                stream.read_exact(&mut body).await.unwrap();
                seen.push(Seen {
                    method,
                    session,
                    body: String::from_utf8(body).unwrap(),
                });

                stream.get_mut().write_all(reply.as_bytes()).await.unwrap();
                stream.get_mut().shutdown().await.unwrap();
            }
            seen
        });
        (url, handle)
    }

    fn transport(url: &str) -> HttpTransport {
        HttpTransport::new(url, &HashMap::new(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn session_id_is_echoed_and_released() {
        let replies = vec![
            reply(
                "200 OK",
                &[("Content-Type", "application/json"), ("Mcp-Session-Id", "abc-123")],
                r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-03-26"}}"#,
            ),
            reply(
                "200 OK",
                &[("Content-Type", "text/event-stream")],
                "event: message\r\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\"}\r\n\r\n\
                 event: message\r\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[]}}\r\n\r\n",
            ),
            reply("204 No Content", &[], ""),
        ];
        let (url, server) = responder(replies).await;
        let transport = transport(&url);

        let first = transport
            .send(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#)
            .await
            .unwrap();
        assert!(first.contains("protocolVersion"));

        let second = transport
            .send(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();
        let frame: serde_json::Value = serde_json::from_str(&second).unwrap();
        assert_eq!(frame, json!({"jsonrpc":"2.0","id":2,"result":{"tools":[]}}));

        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].session, None);
        assert!(seen[0].body.contains("initialize"));
        assert_eq!(seen[1].session.as_deref(), Some("abc-123"));
        assert_eq!(seen[2].method, "DELETE");
        assert_eq!(seen[2].session.as_deref(), Some("abc-123"));
    }

    #[tokio::test]
    async fn error_status_is_a_recoverable_server_error() {
        let replies = vec![reply("404 Not Found", &[], "unknown resource")];
        let (url, server) = responder(replies).await;
        let transport = transport(&url);

        let err = transport
            .send(r#"{"jsonrpc":"2.0","id":5,"method":"resources/read"}"#)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, McpError::ServerError { code: 404, message } if message == "unknown resource")
        );
        assert!(!err.is_fatal());

        // No session id was handed out, so closing sends nothing.
        transport.close().await.unwrap();
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn event_stream_without_the_response_is_an_error() {
        let replies = vec![reply(
            "200 OK",
            &[("Content-Type", "text/event-stream")],
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n\n",
        )];
        let (url, _server) = responder(replies).await;

        let err = transport(&url)
            .send(r#"{"jsonrpc":"2.0","id":9,"method":"prompts/list"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn closed_transport_refuses_requests() {
        let transport = transport("http://127.0.0.1:9/mcp");
        transport.close().await.unwrap();
        let err = transport.send("{}").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn picks_matching_frame_from_event_stream() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"tools\":[]}}\n\n";
        let frame = response_from_sse(body, Some(&json!(3))).unwrap();
        assert!(frame.contains("\"tools\""));
    }

    #[test]
    fn event_stream_without_response_yields_nothing() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n\n";
        assert_eq!(response_from_sse(body, Some(&json!(1))), None);
    }

    #[test]
    fn invalid_headers_are_skipped() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        headers.insert("x-api-key".to_string(), "secret".to_string());
        assert!(HttpTransport::new("http://127.0.0.1:9000/mcp", &headers, Duration::from_secs(5)).is_ok());
    }
}
