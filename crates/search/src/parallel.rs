//! Parallel search provider.
//!
//! Calls the `web_search_preview` tool on Parallel's MCP endpoint with a
//! single JSON-RPC `tools/call` request. The server may answer with plain JSON
//! or a one-shot event stream; both are accepted.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ProviderName, SearchError, SearchProvider, SearchResults};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{map_transport, sources, SearchSetupError};

const ENDPOINT: &str = "https://search-mcp.parallel.ai/mcp";

pub struct ParallelProvider {
    name: ProviderName,
    client: Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
    timeout: Duration,
}

impl ParallelProvider {
    pub fn new(
        api_key: &str,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self, SearchSetupError> {
        Ok(Self {
            name: ProviderName::builtin("parallel"),
            client: Client::builder().timeout(timeout).build()?,
            endpoint: ENDPOINT.to_string(),
            api_key: api_key.to_string(),
            max_results: max_results.max(1),
            timeout,
        })
    }

    fn transport_error(&self, message: impl Into<String>) -> SearchError {
        SearchError::Transport {
            provider: self.name.clone(),
            message: message.into(),
        }
    }

    /// Extracts the tool output from a JSON-RPC response.
    fn parse_response(&self, body: &Value) -> Result<SearchResults, SearchError> {
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown JSON-RPC error");
            return Err(self.transport_error(message));
        }
        let result = body.get("result").unwrap_or(&Value::Null);
        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(self.transport_error(format!("tool error: {}", text_blocks(result))));
        }

        let text = text_blocks(result);
        let sources = sources::extract_urls(&text, self.max_results);
        Ok(SearchResults { text, sources })
    }
}

fn request_body(query: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "tools/call",
        "id": 1,
        "params": {
            "name": "web_search_preview",
            "arguments": {
                "objective": format!("Find detailed information about: {query}"),
                "search_queries": [query],
            }
        }
    })
}

/// Joins every `{"type": "text"}` block of `result.content`.
fn text_blocks(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .unwrap_or_default()
}

/// Decodes either a JSON body or the last `data:` payload of an event stream.
fn decode_body(raw: &str) -> Result<Value, serde_json::Error> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed);
    }
    let payload = raw
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .last()
        .unwrap_or(trimmed);
    serde_json::from_str(payload)
}

#[async_trait]
impl SearchProvider for ParallelProvider {
    fn name(&self) -> &ProviderName {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<SearchResults, SearchError> {
        debug!(endpoint = %self.endpoint, "Querying Parallel search");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(&request_body(query))
            .send()
            .await
            .map_err(|e| map_transport(&self.name, e, self.timeout))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| map_transport(&self.name, e, self.timeout))?;
        if !status.is_success() {
            debug!(status = status.as_u16(), body = %raw, "Parallel search failed");
            return Err(self.transport_error(format!("HTTP {status}")));
        }

        let body = decode_body(&raw)
            .map_err(|e| self.transport_error(format!("invalid response: {e}")))?;
        self.parse_response(&body)
    }
}
