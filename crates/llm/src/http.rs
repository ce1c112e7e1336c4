//! Shared HTTP plumbing for the generation adapters.

use std::time::Duration;

use pipeline::GenerationError;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::LlmError;

pub(crate) fn client(timeout: Duration) -> Result<Client, LlmError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Sends `request` and decodes a JSON body, mapping every failure onto
/// [`GenerationError`].
pub(crate) async fn send_json(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Value, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| map_transport(e, timeout))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| map_transport(e, timeout))?;

    if !status.is_success() {
        return Err(map_status(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| GenerationError::InvalidResponse {
        message: format!("invalid JSON: {e}"),
    })
}

fn map_transport(err: reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        GenerationError::Connection {
            message: err.to_string(),
        }
    }
}

/// Maps a non-success status onto the error taxonomy.
pub(crate) fn map_status(status: StatusCode, body: &str) -> GenerationError {
    debug!(status = status.as_u16(), body = %body, "Generation service returned an error");
    let message = error_message(body);
    match status.as_u16() {
        401 | 403 => GenerationError::Authentication { message },
        code => GenerationError::Api {
            status: code,
            message,
        },
    }
}

/// Extracts `error.message` (OpenAI) or `error` (Ollama) from an error body,
/// falling back to the raw body.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        let error = v.get("error")?;
        error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
    });
    message.unwrap_or_else(|| body.trim().to_string())
}
