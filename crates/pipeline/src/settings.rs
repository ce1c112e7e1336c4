//! Read-only pipeline tuning shared by every run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RunError;

/// Timeouts, retry bounds and optional behaviours for the pipeline.
///
/// Loaded once by the composition root and passed by reference to
/// `nodes::PipelineExecutor::from_settings`, which copies the values into the
/// roles it wires; never mutated by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Per-call timeout for each search provider.
    pub search_timeout_secs: u64,
    /// Per-call timeout for each generation request.
    pub generation_timeout_secs: u64,
    /// Total outline generation attempts, including the first.
    pub outline_max_attempts: u32,
    /// Fixed pause between outline attempts.
    pub outline_retry_delay_ms: u64,
    /// Condense raw search text into a research report before outlining.
    pub summarize_research: bool,
    /// Maximum characters of research quoted in the writing prompt.
    pub research_excerpt_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            search_timeout_secs: 20,
            generation_timeout_secs: 120,
            outline_max_attempts: 3,
            outline_retry_delay_ms: 250,
            summarize_research: false,
            research_excerpt_chars: 2000,
        }
    }
}

impl PipelineSettings {
    /// Rejects values that would make a stage impossible to run.
    pub fn validate(&self) -> Result<(), RunError> {
        let problem = if self.search_timeout_secs == 0 {
            Some("search_timeout_secs must be greater than zero")
        } else if self.generation_timeout_secs == 0 {
            Some("generation_timeout_secs must be greater than zero")
        } else if self.outline_max_attempts == 0 {
            Some("outline_max_attempts must be at least 1")
        } else {
            None
        };
        match problem {
            Some(message) => Err(RunError::Configuration {
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn outline_retry_delay(&self) -> Duration {
        Duration::from_millis(self.outline_retry_delay_ms)
    }
}
