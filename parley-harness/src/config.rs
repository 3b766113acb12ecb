//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then
//! `$PARLEY_HOME/config.toml`, then `./.parley/config.toml`. Providers,
//! models and MCP servers are merged by name; scalar settings in a later
//! layer replace earlier ones. `.env` files are loaded first so credentials
//! can live there, and every credential is resolved exactly once, inside
//! [`ParleyConfig::load_from`]. Loading does not validate: callers apply
//! their overrides first and then call [`ParleyConfig::validate`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{HarnessError, HarnessResult};
use crate::paths::{CONFIG_FILE_NAME, ENV_FILE_NAME, local_config_file};
use parley_llm::backend::BackendType;

/// MCP server transport type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    /// Plain HTTP transport.
    Http,
    /// Streamable HTTP transport.
    #[serde(rename = "streamable-http", alias = "streamable_http")]
    StreamableHttp,
    /// Standard I/O transport.
    Stdio,
}

/// MCP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Server name/alias.
    pub name: String,
    /// Transport type.
    pub transport: McpTransport,
    /// URL for HTTP transports.
    #[serde(default)]
    pub url: Option<String>,
    /// Command for stdio transport.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments for stdio transport.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the stdio server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Additional headers for HTTP transports.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Environment variable holding a bearer token for HTTP transports.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Request timeout in seconds, overriding `mcp_timeout`.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Bearer token resolved from `api_key_env` at load time.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl McpServerConfig {
    /// A stdio server launched from `command` (program followed by arguments).
    #[must_use]
    pub fn stdio(name: impl Into<String>, command: &[String]) -> Self {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (Some(program.clone()), args.to_vec()),
            None => (None, Vec::new()),
        };
        Self {
            command: program,
            args,
            ..Self::empty(name, McpTransport::Stdio)
        }
    }

    /// A streamable HTTP server at `url`.
    #[must_use]
    pub fn streamable_http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::empty(name, McpTransport::StreamableHttp)
        }
    }

    fn empty(name: impl Into<String>, transport: McpTransport) -> Self {
        Self {
            name: name.into(),
            transport,
            url: None,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            headers: HashMap::new(),
            api_key_env: None,
            timeout: None,
            api_key: None,
        }
    }

    /// Program and arguments for a stdio server.
    #[must_use]
    pub fn command_line(&self) -> Vec<String> {
        self.command
            .iter()
            .cloned()
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Headers for HTTP transports, including the resolved bearer token.
    #[must_use]
    pub fn request_headers(&self) -> HashMap<String, String> {
        let mut headers = self.headers.clone();
        if let Some(key) = &self.api_key
            && !headers.keys().any(|k| k.eq_ignore_ascii_case("authorization"))
        {
            headers.insert("Authorization".to_string(), format!("Bearer {key}"));
        }
        headers
    }

    /// Check that the transport has the field it needs and that any timeout
    /// override is usable.
    ///
    /// # Errors
    ///
    /// Returns an error naming the missing `command` or `url`, or the bad
    /// timeout.
    pub fn validate(&self) -> HarnessResult<()> {
        if let Some(secs) = self.timeout {
            check_timeout(&format!("timeout of MCP server '{}'", self.name), secs)?;
        }

        let missing = match self.transport {
            McpTransport::Stdio => self.command.as_deref().is_none_or(str::is_empty),
            McpTransport::Http | McpTransport::StreamableHttp => {
                self.url.as_deref().is_none_or(str::is_empty)
            }
        };
        if missing {
            let field = if self.transport == McpTransport::Stdio {
                "command"
            } else {
                "url"
            };
            return Err(HarnessError::Config(format!(
                "MCP server '{}' needs a {field}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Reject timeouts that cannot become a [`std::time::Duration`].
fn check_timeout(what: &str, secs: f64) -> HarnessResult<()> {
    if secs.is_finite() && secs > 0.0 {
        Ok(())
    } else {
        Err(HarnessError::Config(format!(
            "{what} must be a positive number of seconds, got {secs}"
        )))
    }
}

/// Provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name.
    pub name: String,
    /// Base URL for the API.
    pub api_base: String,
    /// Environment variable for the API key. Empty for keyless providers.
    #[serde(default)]
    pub api_key_env_var: String,
    /// Backend type.
    #[serde(default)]
    pub backend: BackendType,
    /// API key resolved from `api_key_env_var` at load time.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Backend settings with the resolved key.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingApiKey`] when the provider names a key
    /// variable that was not set.
    pub fn backend_config(&self) -> HarnessResult<parley_llm::ProviderConfig> {
        if !self.api_key_env_var.is_empty() && self.api_key.is_none() {
            return Err(HarnessError::MissingApiKey {
                provider: self.name.clone(),
                env_var: self.api_key_env_var.clone(),
            });
        }
        Ok(parley_llm::ProviderConfig {
            name: self.name.clone(),
            api_base: self.api_base.clone(),
            api_key: self.api_key.clone(),
            backend: self.backend,
        })
    }
}

/// Model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name/identifier.
    pub name: String,
    /// Provider for this model.
    pub provider: String,
    /// Alias for the model.
    #[serde(default)]
    pub alias: Option<String>,
    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Cap on generated tokens per turn.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.2
}

impl ModelConfig {
    /// Get the effective alias (falls back to name).
    #[must_use]
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Sampling settings for the backend.
    #[must_use]
    pub fn backend_config(&self) -> parley_llm::ModelConfig {
        parley_llm::ModelConfig {
            name: self.name.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParleyConfig {
    /// Active model alias.
    pub active_model: String,
    /// Provider configurations.
    pub providers: Vec<ProviderConfig>,
    /// Model configurations.
    pub models: Vec<ModelConfig>,
    /// MCP server configurations.
    pub mcp_servers: Vec<McpServerConfig>,
    /// Server used when none is named on the command line.
    pub default_server: Option<String>,
    /// System prompt for the agent.
    pub system_prompt: Option<String>,
    /// Stream model output.
    pub stream: bool,
    /// Model turns allowed per query before the agent gives up.
    pub max_turns: usize,
    /// LLM request timeout in seconds.
    pub api_timeout: f64,
    /// MCP request timeout in seconds.
    pub mcp_timeout: f64,
    /// Inputs that end the session, matched case-insensitively.
    pub quit_commands: Vec<String>,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            active_model: "gpt-4o-mini".to_string(),
            providers: vec![
                ProviderConfig {
                    name: "openai".to_string(),
                    api_base: "https://api.openai.com/v1".to_string(),
                    api_key_env_var: "OPENAI_API_KEY".to_string(),
                    backend: BackendType::OpenAi,
                    api_key: None,
                },
                ProviderConfig {
                    name: "ollama".to_string(),
                    api_base: "http://localhost:11434/v1".to_string(),
                    api_key_env_var: String::new(),
                    backend: BackendType::OpenAi,
                    api_key: None,
                },
            ],
            models: vec![
                ModelConfig {
                    name: "gpt-4o-mini".to_string(),
                    provider: "openai".to_string(),
                    alias: None,
                    temperature: default_temperature(),
                    max_tokens: None,
                },
                ModelConfig {
                    name: "gpt-4o".to_string(),
                    provider: "openai".to_string(),
                    alias: None,
                    temperature: default_temperature(),
                    max_tokens: None,
                },
                ModelConfig {
                    name: "llama3.1".to_string(),
                    provider: "ollama".to_string(),
                    alias: Some("local".to_string()),
                    temperature: default_temperature(),
                    max_tokens: None,
                },
            ],
            mcp_servers: Vec::new(),
            default_server: None,
            system_prompt: None,
            stream: true,
            max_turns: 25,
            api_timeout: 120.0,
            mcp_timeout: 60.0,
            quit_commands: vec!["quit".to_string(), "exit".to_string(), "q".to_string()],
        }
    }
}

/// One configuration file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    active_model: Option<String>,
    #[serde(default)]
    providers: Vec<ProviderConfig>,
    #[serde(default)]
    models: Vec<ModelConfig>,
    #[serde(default)]
    mcp_servers: Vec<McpServerConfig>,
    default_server: Option<String>,
    system_prompt: Option<String>,
    stream: Option<bool>,
    max_turns: Option<usize>,
    api_timeout: Option<f64>,
    mcp_timeout: Option<f64>,
    quit_commands: Option<Vec<String>>,
}

/// Replace entries with the same key, append the rest.
fn merge_by<T>(base: &mut Vec<T>, overlay: Vec<T>, key: impl Fn(&T) -> &str) {
    for item in overlay {
        match base.iter_mut().find(|existing| key(existing) == key(&item)) {
            Some(existing) => *existing = item,
            None => base.push(item),
        }
    }
}

impl ParleyConfig {
    /// Load configuration from `home` and `workdir` without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if config files cannot be read or parsed.
    pub fn load_from(home: &Path, workdir: &Path) -> HarnessResult<Self> {
        load_env_files(home, workdir);

        let mut config = Self::default();
        for path in [home.join(CONFIG_FILE_NAME), local_config_file(workdir)] {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                config.apply(toml::from_str(&content)?);
            }
        }

        config.resolve_credentials(|var| std::env::var(var).ok());
        Ok(config)
    }

    /// Parse a single TOML document over the defaults. Credentials are not
    /// resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is invalid.
    pub fn from_toml(content: &str) -> HarnessResult<Self> {
        let mut config = Self::default();
        config.apply(toml::from_str(content)?);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, layer: ConfigLayer) {
        merge_by(&mut self.providers, layer.providers, |p| p.name.as_str());
        merge_by(&mut self.models, layer.models, |m| m.alias());
        merge_by(&mut self.mcp_servers, layer.mcp_servers, |s| s.name.as_str());

        if let Some(v) = layer.active_model {
            self.active_model = v;
        }
        if layer.default_server.is_some() {
            self.default_server = layer.default_server;
        }
        if layer.system_prompt.is_some() {
            self.system_prompt = layer.system_prompt;
        }
        if let Some(v) = layer.stream {
            self.stream = v;
        }
        if let Some(v) = layer.max_turns {
            self.max_turns = v;
        }
        if let Some(v) = layer.api_timeout {
            self.api_timeout = v;
        }
        if let Some(v) = layer.mcp_timeout {
            self.mcp_timeout = v;
        }
        if let Some(v) = layer.quit_commands {
            self.quit_commands = v;
        }
    }

    /// Fill in `api_key` fields by looking up each named variable once.
    pub fn resolve_credentials(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for provider in &mut self.providers {
            if !provider.api_key_env_var.is_empty() {
                provider.api_key = lookup(&provider.api_key_env_var).filter(|k| !k.is_empty());
            }
        }
        for server in &mut self.mcp_servers {
            if let Some(var) = &server.api_key_env {
                server.api_key = lookup(var).filter(|k| !k.is_empty());
                if server.api_key.is_none() {
                    tracing::warn!("{var} is not set; MCP server '{}' gets no token", server.name);
                }
            }
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the active model, its provider or a server
    /// definition is unusable.
    pub fn validate(&self) -> HarnessResult<()> {
        let model = self.get_active_model()?;
        self.get_provider_for_model(model)?;

        for server in &self.mcp_servers {
            server.validate()?;
        }
        if let Some(name) = &self.default_server {
            self.server(Some(name))?;
        }
        if self.max_turns == 0 {
            return Err(HarnessError::Config("max_turns must be at least 1".into()));
        }
        check_timeout("api_timeout", self.api_timeout)?;
        check_timeout("mcp_timeout", self.mcp_timeout)?;
        Ok(())
    }

    /// Get the active model configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not found.
    pub fn get_active_model(&self) -> HarnessResult<&ModelConfig> {
        self.models
            .iter()
            .find(|m| m.alias() == self.active_model)
            .ok_or_else(|| {
                HarnessError::Config(format!(
                    "Active model '{}' not found in configuration",
                    self.active_model
                ))
            })
    }

    /// Get the provider for a model.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not found.
    pub fn get_provider_for_model(&self, model: &ModelConfig) -> HarnessResult<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.name == model.provider)
            .ok_or_else(|| {
                HarnessError::Config(format!(
                    "Provider '{}' for model '{}' not found",
                    model.provider, model.name
                ))
            })
    }

    /// Pick the MCP server to connect to.
    ///
    /// An explicit name wins, then `default_server`, then the only configured
    /// server.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or the choice is ambiguous.
    pub fn server(&self, name: Option<&str>) -> HarnessResult<&McpServerConfig> {
        let name = name.or(self.default_server.as_deref());
        match (name, self.mcp_servers.as_slice()) {
            (Some(name), servers) => servers.iter().find(|s| s.name == name).ok_or_else(|| {
                HarnessError::Config(format!("MCP server '{name}' not found in configuration"))
            }),
            (None, [only]) => Ok(only),
            (None, []) => Err(HarnessError::Config(
                "No MCP server configured. Add one to config.toml or pass --url / a command."
                    .into(),
            )),
            (None, _) => Err(HarnessError::Config(
                "Several MCP servers configured; choose one with --server or default_server."
                    .into(),
            )),
        }
    }
}

/// Load `.env` files. The working directory's file is read first so it
/// takes precedence; `dotenvy` never overrides variables already set.
fn load_env_files(home: &Path, workdir: &Path) {
    for path in [workdir.join(ENV_FILE_NAME), home.join(ENV_FILE_NAME)] {
        if path.exists()
            && let Err(e) = dotenvy::from_path(&path)
        {
            tracing::warn!("Failed to load {}: {e}", path.display());
        }
    }
}
