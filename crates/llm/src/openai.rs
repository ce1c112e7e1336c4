//! OpenAI chat completions adapter (`POST {base}/chat/completions`).

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{GenerationError, GenerationRequest, TextGenerator};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{http, Backoff, LlmConfig, LlmError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4";

/// Generates text with the OpenAI API or any compatible endpoint.
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    backoff: Backoff,
}

impl OpenAiGenerator {
    /// Fails with [`LlmError::MissingApiKey`] when no non-blank key is set.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingApiKey { provider: "openai" })?
            .to_string();
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Ok(Self {
            client: http::client(timeout)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
            backoff: config.backoff(),
        })
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending OpenAI completion request");
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body);
        let response = http::send_json(request, self.timeout).await?;
        parse_response(&response)
    }
}

fn parse_response(body: &Value) -> Result<String, GenerationError> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| GenerationError::InvalidResponse {
            message: "no choices in response".into(),
        })?;
    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GenerationError::InvalidResponse {
            message: "missing choices[0].message.content".into(),
        })
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        let body = self.request_body(request);
        self.backoff.run(|| self.send(&body)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
