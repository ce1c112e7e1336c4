//! Text generation adapters for the Tea Stall Bench pipeline.
//!
//! Implements [`pipeline::TextGenerator`] for a local Ollama server and for
//! the OpenAI chat completions API. Further providers are added as new types
//! in this crate without any change to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing and exponential back-off live here. The [`pipeline`] crate sees
//! only [`pipeline::TextGenerator`].

use std::sync::Arc;
use std::time::Duration;

use pipeline::TextGenerator;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod http;
pub mod ollama;
pub mod openai;
pub mod retry;

pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;
pub use retry::Backoff;

/// Errors raised while constructing a generator.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} requires an API key")]
    MissingApiKey { provider: &'static str },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Which generation backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    Ollama,
    OpenAi,
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProviderKind::Ollama => f.write_str("ollama"),
            LlmProviderKind::OpenAi => f.write_str("openai"),
        }
    }
}

/// Generator settings, usually the `[llm]` section of the application config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    /// Model name; the provider's default when unset.
    pub model: Option<String>,
    /// API base URL; the provider's default when unset.
    pub base_url: Option<String>,
    /// Bearer token for hosted providers.
    pub api_key: Option<String>,
    /// HTTP timeout for one request.
    pub request_timeout_secs: u64,
    /// Total attempts per generation, including the first.
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Ollama,
            model: None,
            base_url: None,
            api_key: None,
            request_timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

impl LlmConfig {
    fn backoff(&self) -> Backoff {
        Backoff::default().with_max_attempts(self.max_attempts)
    }

    /// Longest a single `generate` call can take: every attempt running to
    /// the request timeout plus the back-off pauses between them.
    pub fn retry_budget(&self) -> Duration {
        self.backoff()
            .budget(Duration::from_secs(self.request_timeout_secs))
    }
}

/// Builds the generator selected by `config.provider`.
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, LlmError> {
    let generator: Arc<dyn TextGenerator> = match config.provider {
        LlmProviderKind::Ollama => Arc::new(OllamaGenerator::new(config)?),
        LlmProviderKind::OpenAi => Arc::new(OpenAiGenerator::new(config)?),
    };
    tracing::info!(
        provider = %config.provider,
        model = generator.model_name(),
        "Text generator configured"
    );
    Ok(generator)
}
