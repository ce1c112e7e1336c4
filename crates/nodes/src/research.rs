//! Research stage collaborators: the failover search gateway and the optional
//! research synthesizer.
//!
//! The gateway tries the primary provider once and, on timeout, transport
//! error or empty result, the secondary provider once. It never retries a
//! provider. Any non-empty text is accepted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    GenerationError, GenerationRequest, Research, SearchError, SearchGateway, SearchProvider,
    SearchResults, Topic,
};
use tracing::{debug, info, warn};

use crate::gateway::LlmGateway;
use crate::prompts;

// ---------------------------------------------------------------------------
// FailoverSearchGateway
// ---------------------------------------------------------------------------

/// Primary-then-secondary search with a per-call timeout.
pub struct FailoverSearchGateway {
    primary: Arc<dyn SearchProvider>,
    secondary: Option<Arc<dyn SearchProvider>>,
    timeout: Duration,
}

impl FailoverSearchGateway {
    /// Creates a gateway. With no secondary, a primary failure is final.
    pub fn new(
        primary: Arc<dyn SearchProvider>,
        secondary: Option<Arc<dyn SearchProvider>>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout,
        }
    }

    async fn attempt(
        &self,
        provider: &dyn SearchProvider,
        query: &str,
    ) -> Result<SearchResults, SearchError> {
        debug!(provider = %provider.name(), "Searching");
        let results = tokio::time::timeout(self.timeout, provider.search(query))
            .await
            .map_err(|_| SearchError::Timeout {
                provider: provider.name().clone(),
                timeout_secs: self.timeout.as_secs(),
            })??;
        if results.is_empty() {
            return Err(SearchError::EmptyResult {
                provider: provider.name().clone(),
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl SearchGateway for FailoverSearchGateway {
    async fn fetch(&self, topic: &Topic) -> Result<Research, SearchError> {
        let query = topic.as_str();

        let primary_error = match self.attempt(self.primary.as_ref(), query).await {
            Ok(results) => {
                info!(
                    provider = %self.primary.name(),
                    sources = results.sources.len(),
                    "Primary search succeeded"
                );
                return Ok(Research {
                    text: results.text,
                    sources: results.sources,
                    provider: self.primary.name().clone(),
                    used_fallback: false,
                    primary_failure: None,
                });
            }
            Err(err) => err,
        };

        let Some(secondary) = &self.secondary else {
            warn!(error = %primary_error, "Search failed and no secondary provider is configured");
            return Err(SearchError::ResearchUnavailable {
                primary: Box::new(primary_error),
                secondary: None,
            });
        };

        warn!(
            primary = %self.primary.name(),
            secondary = %secondary.name(),
            error = %primary_error,
            transient = primary_error.retry_policy().is_retryable(),
            "Primary search failed, falling back"
        );

        match self.attempt(secondary.as_ref(), query).await {
            Ok(results) => {
                warn!(
                    provider = %secondary.name(),
                    sources = results.sources.len(),
                    "Research served by secondary provider"
                );
                Ok(Research {
                    text: results.text,
                    sources: results.sources,
                    provider: secondary.name().clone(),
                    used_fallback: true,
                    primary_failure: Some(primary_error.to_string()),
                })
            }
            Err(secondary_error) => {
                warn!(error = %secondary_error, "Secondary search failed");
                Err(SearchError::ResearchUnavailable {
                    primary: Box::new(primary_error),
                    secondary: Some(Box::new(secondary_error)),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ResearchSynthesizer
// ---------------------------------------------------------------------------

/// Condenses raw search output into a Markdown research report.
#[derive(Clone)]
pub struct ResearchSynthesizer {
    llm: LlmGateway,
}

impl ResearchSynthesizer {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }

    /// Returns the synthesized report. Blank output is reported as an invalid
    /// response so the caller keeps the raw text.
    pub async fn synthesize(
        &self,
        topic: &Topic,
        research: &Research,
    ) -> Result<String, GenerationError> {
        let prompt = prompts::research_summary_prompt(topic, &research.text);
        let report = self
            .llm
            .generate(GenerationRequest::new(prompt).with_temperature(prompts::RESEARCH_TEMPERATURE))
            .await?;
        let report = report.trim();
        if report.is_empty() {
            return Err(GenerationError::InvalidResponse {
                message: "empty research report".into(),
            });
        }
        Ok(report.to_string())
    }
}
