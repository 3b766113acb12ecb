//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

use parley_harness::{McpServerConfig, ParleyConfig};

/// Chat with a tool-using agent backed by an MCP server.
///
/// Besides free-form questions the session understands `@<id>` (read a
/// customer resource), `/prompts` and `/prompt <name> key=value...`.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Interactive MCP chat session with a tool-using agent")]
pub struct Args {
    /// Directory holding config.toml and .env (defaults to $PARLEY_HOME or ~/.parley)
    #[arg(long, value_name = "DIR", env = "PARLEY_HOME")]
    pub config_dir: Option<PathBuf>,

    /// Configured MCP server to connect to
    #[arg(long, value_name = "NAME", conflicts_with = "url")]
    pub server: Option<String>,

    /// Connect to a streamable HTTP MCP server at URL
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Model alias to use instead of `active_model`
    #[arg(long, value_name = "ALIAS")]
    pub model: Option<String>,

    /// Wait for whole model replies instead of streaming them
    #[arg(long)]
    pub no_stream: bool,

    /// Maximum model turns per query
    #[arg(long, value_name = "N")]
    pub max_turns: Option<usize>,

    /// Launch this command as a stdio MCP server
    #[arg(last = true, value_name = "COMMAND", conflicts_with_all = ["server", "url"])]
    pub command: Vec<String>,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut ParleyConfig) {
        if let Some(model) = &self.model {
            config.active_model.clone_from(model);
        }
        if self.no_stream {
            config.stream = false;
        }
        if let Some(max_turns) = self.max_turns {
            config.max_turns = max_turns;
        }
    }

    /// A server given directly on the command line, if any.
    #[must_use]
    pub fn ad_hoc_server(&self) -> Option<McpServerConfig> {
        if !self.command.is_empty() {
            return Some(McpServerConfig::stdio("command-line", &self.command));
        }
        self.url
            .as_ref()
            .map(|url| McpServerConfig::streamable_http("command-line", url.clone()))
    }
}
