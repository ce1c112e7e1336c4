//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    GenerationError, GenerationRequest, ProviderName, SearchError, SearchProvider, SearchResults,
    Source, TextGenerator,
};

/// A generator that replays queued responses in order and records every
/// prompt it receives. Fails with a connection error once the script runs out.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleeps before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(GenerationError::Connection {
                message: "script exhausted".into(),
            })
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// A search provider that always gives the same answer.
pub struct StaticSearch {
    name: ProviderName,
    result: Result<SearchResults, SearchError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticSearch {
    /// Answers with `text` and one source.
    pub fn ok(name: &str, text: &str) -> Self {
        Self::with_result(
            name,
            Ok(SearchResults {
                text: text.to_string(),
                sources: vec![Source::new(
                    format!("{name} result"),
                    format!("https://{name}.example/1"),
                )],
            }),
        )
    }

    /// Fails with a transport error.
    pub fn failing(name: &str) -> Self {
        let provider = provider_name(name);
        Self::with_result(
            name,
            Err(SearchError::Transport {
                provider,
                message: "connection refused".into(),
            }),
        )
    }

    /// Succeeds with blank text.
    pub fn empty(name: &str) -> Self {
        Self::with_result(name, Ok(SearchResults::default()))
    }

    pub fn with_result(name: &str, result: Result<SearchResults, SearchError>) -> Self {
        Self {
            name: provider_name(name),
            result,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleeps before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &ProviderName {
        &self.name
    }

    async fn search(&self, _query: &str) -> Result<SearchResults, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

pub fn provider_name(name: &str) -> ProviderName {
    ProviderName::new(name).unwrap()
}

/// A valid outline JSON with the given headings.
pub fn outline_json(title: &str, headings: &[&str]) -> String {
    let sections: Vec<serde_json::Value> = headings
        .iter()
        .map(|h| serde_json::json!({"heading": h, "key_points": [format!("About {h}")]}))
        .collect();
    serde_json::json!({"title": title, "sections": sections}).to_string()
}
