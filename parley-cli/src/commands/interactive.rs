//! The interactive session loop.
//!
//! One line is read, classified and fully handled before the next is read,
//! including every tool round trip the agent makes. The loop owns the MCP
//! session for its whole life and closes it on the way out, however the
//! loop ends.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use parley_harness::{Agent, AgentEvent, HarnessError};
use parley_mcp::{McpClient, McpError, McpResult};

use super::{Command, CommandClassifier, resource_uri};
use crate::ui::Renderer;

const EVENT_BUFFER: usize = 64;

/// A failure that ends the session.
#[derive(Debug, Error)]
pub enum SessionFault {
    /// The MCP session broke during a direct request.
    #[error(transparent)]
    Protocol(McpError),
    /// The MCP session broke while the agent was using a tool.
    #[error(transparent)]
    Agent(HarnessError),
    /// Operator input could not be read.
    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

/// Split a protocol result into a per-command outcome, or a fault that ends
/// the session.
pub fn triage<T>(result: McpResult<T>) -> Result<Result<T, McpError>, SessionFault> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(e) if e.is_fatal() => Err(SessionFault::Protocol(e)),
        Err(e) => {
            tracing::warn!("Request failed: {e}");
            Ok(Err(e))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Reads operator commands from `R` and renders results onto `W`.
pub struct Dispatcher<R, W: Write> {
    session: Arc<McpClient>,
    agent: Agent,
    classifier: CommandClassifier,
    input: R,
    renderer: Renderer<W>,
}

impl<R, W> Dispatcher<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        session: Arc<McpClient>,
        agent: Agent,
        classifier: CommandClassifier,
        input: R,
        output: W,
    ) -> Self {
        Self {
            session,
            agent,
            classifier,
            input,
            renderer: Renderer::new(output),
        }
    }

    /// Run until the operator quits, input ends, or the session breaks.
    ///
    /// The session is closed before this returns.
    ///
    /// # Errors
    ///
    /// Returns the fault that ended the session early.
    pub async fn run(mut self) -> Result<(), SessionFault> {
        self.renderer.banner();

        let outcome = self.read_eval_loop().await;
        if let Err(fault) = &outcome {
            tracing::error!("Session ended: {fault}");
            self.renderer.fatal(fault);
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!("Failed to close MCP session: {e}");
        }
        outcome
    }

    async fn read_eval_loop(&mut self) -> Result<(), SessionFault> {
        let mut line = String::new();
        loop {
            self.renderer.input_prompt();
            line.clear();
            if self.input.read_line(&mut line).await? == 0 {
                tracing::debug!("Input closed");
                self.renderer.farewell();
                return Ok(());
            }

            let raw = line.trim();
            if raw.is_empty() {
                continue;
            }

            let command = self.classifier.classify(raw);
            tracing::debug!("Dispatching {command:?}");
            if self.dispatch(command).await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Flow, SessionFault> {
        match command {
            Command::Quit => {
                self.renderer.farewell();
                return Ok(Flow::Quit);
            }
            Command::ResourceQuery { id } => self.show_resource(&id).await?,
            Command::ListPrompts => self.list_prompts().await?,
            Command::ExecutePrompt { name, args } => {
                if let Some(query) = self.render_prompt(&name, &args).await? {
                    self.ask_agent(&query).await?;
                }
            }
            Command::Usage(usage) => self.renderer.usage(&usage),
            Command::UnknownCommand { token } => self.renderer.unknown_command(&token),
            Command::FreeQuery { text } => self.ask_agent(&text).await?,
        }
        Ok(Flow::Continue)
    }

    async fn show_resource(&mut self, id: &str) -> Result<(), SessionFault> {
        let uri = resource_uri(id);
        match triage(self.session.read_resource(&uri).await)? {
            Ok(result) => match result.contents.first().and_then(|c| c.text.as_deref()) {
                Some(text) => self.renderer.resource(&uri, text),
                None => self.renderer.no_content(),
            },
            Err(e) => self.renderer.error(&e),
        }
        Ok(())
    }

    async fn list_prompts(&mut self) -> Result<(), SessionFault> {
        match triage(self.session.list_prompts().await)? {
            Ok(prompts) => self.renderer.prompts(&prompts),
            Err(e) => self.renderer.error(&e),
        }
        Ok(())
    }

    /// Render a prompt server-side. `None` means there is nothing to ask.
    async fn render_prompt(
        &mut self,
        name: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<Option<String>, SessionFault> {
        self.renderer.executing_prompt(name);
        match triage(self.session.get_prompt(name, args).await)? {
            Ok(prompt) => match prompt.text() {
                Some(text) => return Ok(Some(text)),
                None => self
                    .renderer
                    .error(&format_args!("prompt '{name}' rendered no messages")),
            },
            Err(e) => self.renderer.error(&e),
        }
        Ok(None)
    }

    /// Run the agent on `query`, rendering its events as they arrive.
    async fn ask_agent(&mut self, query: &str) -> Result<(), SessionFault> {
        let (tx, mut rx) = mpsc::channel::<AgentEvent>(EVENT_BUFFER);
        let agent = &mut self.agent;
        let renderer = &mut self.renderer;

        let (outcome, ()) = tokio::join!(agent.act(query, tx), async {
            while let Some(event) = rx.recv().await {
                renderer.agent_event(&event);
            }
        });

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(SessionFault::Agent(e)),
            Err(e) => {
                tracing::warn!("Agent failed: {e}");
                self.renderer.error(&e);
            }
        }
        self.renderer.separator();
        Ok(())
    }
}
