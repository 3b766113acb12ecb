//! parley: an interactive MCP chat session.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;
mod ui;

use args::Args;
use commands::CommandClassifier;
use commands::interactive::Dispatcher;
use parley_harness::{Agent, ParleyConfig, paths};
use parley_mcp::McpClient;
use parley_tools::ToolManager;

fn load_config(args: &Args) -> Result<ParleyConfig> {
    let home = args.config_dir.clone().unwrap_or_else(paths::parley_home);
    let workdir = std::env::current_dir()?;

    let mut config = ParleyConfig::load_from(&home, &workdir)
        .with_context(|| format!("Failed to load configuration from {}", home.display()))?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Discover tools, build the agent and run the session loop.
async fn serve(config: &ParleyConfig, session: Arc<McpClient>) -> Result<ExitCode> {
    let mut tools = ToolManager::new();
    let remote_tools = session.list_tools().await.context("Failed to list tools")?;
    tools.register_mcp_tools(session.clone(), remote_tools);

    let agent = Agent::new(config, tools)?;
    let dispatcher = Dispatcher::new(
        session,
        agent,
        CommandClassifier::from_config(config),
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );

    // Faults are rendered by the dispatcher itself.
    Ok(match dispatcher.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    })
}

async fn run(args: &Args) -> Result<ExitCode> {
    let config = load_config(args)?;

    let server = match args.ad_hoc_server() {
        Some(server) => server,
        None => config.server(args.server.as_deref())?.clone(),
    };
    server.validate()?;

    let session = parley_harness::connect(&server, Duration::from_secs_f64(config.mcp_timeout))
        .await
        .with_context(|| format!("Failed to connect to MCP server '{}'", server.name))?;

    parley_harness::scoped(session, |session| serve(&config, session)).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // stdout belongs to the operator; logs go to stderr.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
