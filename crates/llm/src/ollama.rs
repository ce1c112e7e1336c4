//! Ollama chat adapter (`POST /api/chat`, non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{GenerationError, GenerationRequest, TextGenerator};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{http, Backoff, LlmConfig, LlmError};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3";

/// Generates text with a local Ollama server.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    backoff: Backoff,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Ok(Self {
            client: http::client(timeout)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
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
            "stream": false,
        });
        if let Some(temperature) = request.temperature {
            body["options"] = json!({ "temperature": temperature });
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<String, GenerationError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(url = %url, model = %self.model, "Sending Ollama chat request");
        let response = http::send_json(self.client.post(&url).json(body), self.timeout).await?;
        parse_response(&response)
    }
}

fn parse_response(body: &Value) -> Result<String, GenerationError> {
    body.get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GenerationError::InvalidResponse {
            message: "missing message.content".into(),
        })
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
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
