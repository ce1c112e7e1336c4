//! Web search adapters for the Tea Stall Bench pipeline.
//!
//! Implements [`pipeline::SearchProvider`] for the Parallel search MCP
//! endpoint and the DuckDuckGo instant answer API, and selects the
//! primary/secondary pair from configuration.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport and response decoding live here;
//! failover between providers is the `nodes` crate's job.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{ProviderName, SearchError, SearchProvider};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub mod duckduckgo;
pub mod parallel;
mod sources;

pub use duckduckgo::DuckDuckGoProvider;
pub use parallel::ParallelProvider;

/// Value shipped in `.env` templates; treated as "no key".
pub const PLACEHOLDER_PARALLEL_KEY: &str = "your_parallel_api_key_here";

/// Errors raised while constructing providers.
#[derive(Debug, Error)]
pub enum SearchSetupError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    Parallel,
    DuckDuckGo,
}

/// Search settings, usually the `[search]` section of the application config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub primary: SearchProviderKind,
    pub secondary: Option<SearchProviderKind>,
    pub parallel_api_key: Option<String>,
    /// Upper bound on sources kept per search.
    pub max_results: usize,
    /// HTTP timeout for one request. The pipeline applies its own per-call
    /// timeout on top.
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            primary: SearchProviderKind::Parallel,
            secondary: Some(SearchProviderKind::DuckDuckGo),
            parallel_api_key: None,
            max_results: 5,
            request_timeout_secs: 60,
        }
    }
}

impl SearchConfig {
    /// The Parallel key, unless it is missing, blank or the template value.
    pub fn usable_parallel_key(&self) -> Option<&str> {
        self.parallel_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_PARALLEL_KEY)
    }
}

/// Primary provider and optional secondary for the failover gateway.
pub struct ProviderPair {
    pub primary: Arc<dyn SearchProvider>,
    pub secondary: Option<Arc<dyn SearchProvider>>,
}

/// Builds the configured providers.
///
/// Parallel is skipped when no usable key is configured; if that leaves no
/// primary, the secondary is promoted. A secondary equal to the primary is
/// dropped.
pub fn build_providers(config: &SearchConfig) -> Result<ProviderPair, SearchSetupError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let key = config.usable_parallel_key();

    let mut kinds = std::iter::once(config.primary)
        .chain(config.secondary)
        .filter(|kind| match kind {
            SearchProviderKind::Parallel if key.is_none() => {
                warn!("Parallel search configured without an API key, skipping it");
                false
            }
            _ => true,
        })
        .collect::<Vec<_>>();
    kinds.dedup();

    let mut providers = kinds
        .into_iter()
        .map(|kind| build_one(kind, key, config.max_results, timeout))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let primary = match providers.next() {
        Some(primary) => primary,
        None => build_one(SearchProviderKind::DuckDuckGo, None, config.max_results, timeout)?,
    };
    let secondary = providers.next();
    info!(
        primary = %primary.name(),
        secondary = ?secondary.as_ref().map(|s| s.name().to_string()),
        "Search providers configured"
    );
    Ok(ProviderPair { primary, secondary })
}

fn build_one(
    kind: SearchProviderKind,
    parallel_key: Option<&str>,
    max_results: usize,
    timeout: Duration,
) -> Result<Arc<dyn SearchProvider>, SearchSetupError> {
    Ok(match (kind, parallel_key) {
        (SearchProviderKind::Parallel, Some(key)) => {
            Arc::new(ParallelProvider::new(key, max_results, timeout)?)
        }
        _ => Arc::new(DuckDuckGoProvider::new(max_results, timeout)?),
    })
}

pub(crate) fn map_transport(
    provider: &ProviderName,
    err: reqwest::Error,
    timeout: Duration,
) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout {
            provider: provider.clone(),
            timeout_secs: timeout.as_secs(),
        }
    } else {
        SearchError::Transport {
            provider: provider.clone(),
            message: err.to_string(),
        }
    }
}
