//! LLM gateway: every generation call made by a node goes through here.
//!
//! The gateway applies the per-call timeout and emits the request/response
//! events; nodes never call a [`TextGenerator`] directly.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{GenerationError, GenerationRequest, TextGenerator};
use tracing::debug;

/// Wraps a [`TextGenerator`] with a per-call timeout.
#[derive(Clone)]
pub struct LlmGateway {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl LlmGateway {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Sends one request. An in-flight call that exceeds the timeout is
    /// dropped and reported as [`GenerationError::Timeout`]. The timeout
    /// bounds the whole call, including any retries the generator makes.
    pub async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        debug!(
            model = self.generator.model_name(),
            prompt_chars = request.prompt.len(),
            temperature = ?request.temperature,
            "Sending generation request"
        );
        let response = tokio::time::timeout(self.timeout, self.generator.generate(&request))
            .await
            .map_err(|_| GenerationError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })??;
        debug!(
            model = self.generator.model_name(),
            response_chars = response.len(),
            "Generation response received"
        );
        Ok(response)
    }
}
