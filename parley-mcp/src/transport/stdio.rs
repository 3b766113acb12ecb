//! Stdio transport for MCP (local process communication).

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::{Transport, is_response_to, request_id};
use crate::error::{McpError, McpResult};

/// Stdio transport for local MCP server processes.
pub struct StdioTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    closed: AtomicBool,
}

impl StdioTransport {
    /// Create a new stdio transport by spawning a process.
    ///
    /// # Arguments
    ///
    /// * `command` - The command and arguments to spawn
    /// * `env` - Extra environment variables for the server process
    pub async fn new(command: &[String], env: &HashMap<String, String>) -> McpResult<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(McpError::ProcessSpawnError("Empty command".to_string()));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            McpError::ProcessSpawnError(format!("Failed to spawn '{}': {e}", command.join(" ")))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::ProcessSpawnError("Failed to capture stdin".to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::ProcessSpawnError("Failed to capture stdout".to_string()))?;

        tracing::info!("Spawned MCP server: {}", command.join(" "));

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> McpResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionFailed("Transport is closed".to_string()));
        }
        Ok(())
    }

    async fn write_line(&self, message: &str) -> McpResult<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(message.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: &str) -> McpResult<String> {
        self.ensure_open()?;
        self.write_line(message).await?;

        let id = request_id(message);
        let mut stdout = self.stdout.lock().await;
        loop {
            let mut line = String::new();
            if stdout.read_line(&mut line).await? == 0 {
                return Err(McpError::ConnectionFailed(
                    "MCP server closed its output".to_string(),
                ));
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(frame) if is_response_to(&frame, id.as_ref()) => return Ok(line.to_string()),
                Ok(_) => tracing::debug!("Skipping MCP frame: {line}"),
                Err(_) => tracing::debug!("Skipping non-JSON output from MCP server: {line}"),
            }
        }
    }

    async fn notify(&self, message: &str) -> McpResult<()> {
        self.ensure_open()?;
        self.write_line(message).await
    }

    async fn close(&self) -> McpResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // EOF on stdin asks the server to exit.
        {
            let mut stdin = self.stdin.lock().await;
            let _ = stdin.shutdown().await;
        }

        let mut child = self.child.lock().await;
        let status = child.wait().await?;
        tracing::info!("MCP server exited with {status}");
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
