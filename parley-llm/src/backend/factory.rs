//! Backend factory for creating LLM backends.

use super::{Backend, ProviderConfig};
use crate::error::LlmResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Type of backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// OpenAI-compatible `chat/completions` endpoint.
    #[default]
    #[serde(alias = "openai-compatible")]
    OpenAi,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            _ => Err(format!("Unknown backend type: {s}. Supported: 'openai'.")),
        }
    }
}

/// Factory for creating LLM backends.
pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend for the given provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created.
    pub fn create(provider: &ProviderConfig, timeout: Duration) -> LlmResult<Arc<dyn Backend>> {
        match provider.backend {
            BackendType::OpenAi => Ok(Arc::new(super::OpenAiBackend::new(
                provider.clone(),
                timeout,
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() {
        assert_eq!("OpenAI".parse::<BackendType>(), Ok(BackendType::OpenAi));
        assert_eq!(
            "openai-compatible".parse::<BackendType>(),
            Ok(BackendType::OpenAi)
        );
        assert!("local".parse::<BackendType>().is_err());
    }
}
