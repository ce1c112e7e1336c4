//! DuckDuckGo instant answer provider.
//!
//! Uses the keyless `api.duckduckgo.com` JSON endpoint. The abstract, related
//! topics and results are flattened into one text block, each entry followed
//! by its URL.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ProviderName, SearchError, SearchProvider, SearchResults, Source};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{map_transport, sources, SearchSetupError};

const ENDPOINT: &str = "https://api.duckduckgo.com/";

pub struct DuckDuckGoProvider {
    name: ProviderName,
    client: Client,
    max_results: usize,
    timeout: Duration,
}

impl DuckDuckGoProvider {
    pub fn new(max_results: usize, timeout: Duration) -> Result<Self, SearchSetupError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("teastall/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            name: ProviderName::builtin("duckduckgo"),
            client,
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
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &ProviderName {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<SearchResults, SearchError> {
        let url = Url::parse_with_params(
            ENDPOINT,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|e| self.transport_error(e.to_string()))?;
        debug!(url = %url, "Querying DuckDuckGo");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport(&self.name, e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.transport_error(format!("HTTP {status}")));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| self.transport_error(format!("invalid response: {e}")))?;

        Ok(parse_instant_answer(&body, self.max_results))
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Related topics may be grouped under `{"Name": …, "Topics": [...]}`.
fn flatten_topics(topics: &[Value]) -> Vec<&Value> {
    topics
        .iter()
        .flat_map(|topic| match topic.get("Topics").and_then(Value::as_array) {
            Some(group) => group.iter().collect::<Vec<_>>(),
            None => vec![topic],
        })
        .collect()
}

/// Turns an instant answer body into text and sources. An answer with no
/// content yields empty results, which the gateway treats as a failure.
fn parse_instant_answer(body: &Value, max_results: usize) -> SearchResults {
    let mut entries = Vec::new();
    let mut found: Vec<Source> = Vec::new();

    let abstract_text = str_field(body, "AbstractText");
    if !abstract_text.is_empty() {
        let source = match str_field(body, "AbstractSource") {
            "" => "Unknown",
            s => s,
        };
        let url = str_field(body, "AbstractURL");
        entries.push(format!("[{source}] {abstract_text}\n  URL: {url}"));
        sources::push_unique(&mut found, source, url, max_results);
    }

    let answer = str_field(body, "Answer");
    if !answer.is_empty() {
        entries.push(format!("Answer: {answer}"));
    }

    let related = body
        .get("RelatedTopics")
        .and_then(Value::as_array)
        .map(|t| flatten_topics(t))
        .unwrap_or_default();
    let results = body
        .get("Results")
        .and_then(Value::as_array)
        .map(|r| r.iter().collect::<Vec<_>>())
        .unwrap_or_default();

    for item in results.into_iter().chain(related) {
        if entries.len() >= max_results {
            break;
        }
        let text = str_field(item, "Text");
        if text.is_empty() {
            continue;
        }
        let url = str_field(item, "FirstURL");
        entries.push(format!("- {text}\n  URL: {url}"));
        sources::push_unique(&mut found, text, url, max_results);
    }

    SearchResults {
        text: entries.join("\n\n"),
        sources: found,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parses_abstract_and_grouped_topics() {
        let body = json!({
            "AbstractText": "Python is a programming language.",
            "AbstractSource": "Wikipedia",
            "AbstractURL": "https://en.wikipedia.org/wiki/Python_(programming_language)",
            "Results": [],
            "RelatedTopics": [
                {"Text": "PEP 8 - Style guide", "FirstURL": "https://duckduckgo.com/PEP_8"},
                {"Name": "Tools", "Topics": [
                    {"Text": "pip - Package installer", "FirstURL": "https://duckduckgo.com/pip"}
                ]}
            ]
        });
        let results = parse_instant_answer(&body, 5);

        assert!(results.text.starts_with("[Wikipedia] Python is a programming language."));
        assert!(results.text.contains("- pip - Package installer"));
        assert_eq!(results.sources.len(), 3);
        assert_eq!(results.sources[0].title, "Wikipedia");
        assert_eq!(results.sources[2].url, "https://duckduckgo.com/pip");
    }

    #[test]
    fn test_respects_max_results() {
        let topics: Vec<Value> = (0..10)
            .map(|i| json!({"Text": format!("Topic {i}"), "FirstURL": format!("https://duckduckgo.com/t{i}")}))
            .collect();
        let body = json!({"RelatedTopics": topics});
        let results = parse_instant_answer(&body, 3);
        assert_eq!(results.sources.len(), 3);
        assert_eq!(results.text.matches("URL:").count(), 3);
    }

    #[test]
    fn test_empty_answer_is_empty() {
        let body = json!({"AbstractText": "", "RelatedTopics": [], "Results": []});
        assert!(parse_instant_answer(&body, 5).is_empty());
    }
}
