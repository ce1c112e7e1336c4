//! Port traits: the collaborator contracts the pipeline consumes.
//!
//! Two kinds of port live here:
//!
//! - **Service ports** implemented by infrastructure crates:
//!   [`TextGenerator`] (the `llm` crate) and [`SearchProvider`] (the `search`
//!   crate).
//! - **Role ports** implemented by the `nodes` crate and injected into the
//!   executor: [`SearchGateway`], [`OutlineBuilder`] and [`Writer`].
//!
//! Every port is object-safe via `async_trait` so implementations are supplied
//! as `Arc<dyn …>` at construction time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Article, ContentOptions, GenerationRequest, Outline, ProviderName, RetryPolicy,
    SearchResults, Source, Topic,
};

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

/// Failures from the text generation service.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("generation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("generation service unreachable: {message}")]
    Connection { message: String },

    /// The service answered with a non-success status.
    #[error("generation service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("generation service rejected credentials: {message}")]
    Authentication { message: String },

    #[error("generation response could not be decoded: {message}")]
    InvalidResponse { message: String },

    #[error("prompt must not be empty")]
    EmptyPrompt,
}

impl GenerationError {
    /// Classifies this error for retry decisions.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            GenerationError::Timeout { .. } | GenerationError::Connection { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            GenerationError::Api { status, .. } if *status == 429 || *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// The text generation service: `generate(prompt) -> text`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for `request.prompt`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Model identifier, used in log fields.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Failures from search providers and the search gateway.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    #[error("{provider} timed out after {timeout_secs}s")]
    Timeout {
        provider: ProviderName,
        timeout_secs: u64,
    },

    /// Connection failure, non-success status, or undecodable body.
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: ProviderName,
        message: String,
    },

    #[error("{provider} returned no results")]
    EmptyResult { provider: ProviderName },

    /// Every configured provider failed.
    #[error("{}", unavailable_message(.primary, .secondary.as_deref()))]
    ResearchUnavailable {
        primary: Box<SearchError>,
        secondary: Option<Box<SearchError>>,
    },
}

impl SearchError {
    /// Classifies this error for retry decisions. The gateway never retries
    /// the same provider; a retryable failure is a reason to fail over.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            SearchError::Timeout { .. } | SearchError::Transport { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            SearchError::EmptyResult { .. } | SearchError::ResearchUnavailable { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

fn unavailable_message(primary: &SearchError, secondary: Option<&SearchError>) -> String {
    match secondary {
        Some(secondary) => format!("research unavailable: {primary}; {secondary}"),
        None => format!("research unavailable: {primary}"),
    }
}

/// A web search backend: `search(query) -> {text, sources}`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logs and degradation messages.
    fn name(&self) -> &ProviderName;

    /// Runs one search. An `Ok` with blank text is treated as an empty result
    /// by the gateway.
    async fn search(&self, query: &str) -> Result<SearchResults, SearchError>;
}

// ---------------------------------------------------------------------------
// Role: Search Gateway
// ---------------------------------------------------------------------------

/// Research material produced by the [`SearchGateway`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Research {
    pub text: String,
    pub sources: Vec<Source>,
    /// Provider that served the result.
    pub provider: ProviderName,
    /// `true` when the secondary provider answered after the primary failed.
    pub used_fallback: bool,
    /// Why the primary was abandoned, when `used_fallback` is set.
    pub primary_failure: Option<String>,
}

/// Unifies the search providers behind one call with failover.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    /// Fetches research for `topic`, failing with
    /// [`SearchError::ResearchUnavailable`] when no provider produced text.
    async fn fetch(&self, topic: &Topic) -> Result<Research, SearchError>;
}

// ---------------------------------------------------------------------------
// Role: Outline Builder
// ---------------------------------------------------------------------------

/// Signals that no valid outline was produced and the fallback was used.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("no valid outline after {attempts} attempt(s): {last_error}")]
pub struct OutlineFailure {
    /// Generation attempts made.
    pub attempts: u32,
    /// The last parse, validation or generation error.
    pub last_error: String,
}

/// Result of [`OutlineBuilder::build`]: always carries a valid outline.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineBuild {
    pub outline: Outline,
    /// Attempts used to produce `outline`.
    pub attempts: u32,
    /// Present when `outline` is the deterministic fallback.
    pub failure: Option<OutlineFailure>,
}

/// Turns free-text research into a validated outline.
#[async_trait]
pub trait OutlineBuilder: Send + Sync {
    /// Builds an outline; `research` may be absent when the Research stage
    /// failed. Never returns an invalid outline.
    async fn build(&self, topic: &Topic, research: Option<&str>) -> OutlineBuild;
}

// ---------------------------------------------------------------------------
// Role: Writer
// ---------------------------------------------------------------------------

/// Everything the Writer needs for one article.
#[derive(Debug, Clone, Copy)]
pub struct WritingBrief<'a> {
    pub topic: &'a Topic,
    pub research: Option<&'a str>,
    pub outline: &'a Outline,
    pub options: &'a ContentOptions,
}

/// Outline headings the written text does not address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub missing_headings: Vec<String>,
}

impl ComplianceReport {
    /// Returns `true` when every heading is addressed.
    pub fn is_compliant(&self) -> bool {
        self.missing_headings.is_empty()
    }
}

/// A generated article together with its compliance verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub article: Article,
    pub compliance: ComplianceReport,
}

/// Failures that leave the Write stage with no article.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WriteError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("generation returned empty text")]
    EmptyOutput,
}

/// Turns an outline and research into prose.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Writes the article. Non-compliant text is still returned in the
    /// [`Draft`]; only generation failures produce an error.
    async fn write(&self, brief: WritingBrief<'_>) -> Result<Draft, WriteError>;
}
