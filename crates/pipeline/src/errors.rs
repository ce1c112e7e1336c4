//! Top-level error and retry-policy types for the pipeline domain.
//!
//! [`RunError`] covers conditions that abort a run outright. Stage-level
//! failures (search, generation, outline validation, writing) are defined next
//! to the port or value type they belong to and never escape the executor:
//! they are converted into `RunState.errors` entries instead.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Stage;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let callers decide whether to
/// re-invoke an operation or give up.
///
/// - `Retryable` errors: timeouts, connection failures, 429 and 5xx responses.
/// - `NonRetryable` errors: authentication failures, malformed requests,
///   invalid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a pipeline run.
///
/// These are distinct from stage-level errors in that the caller receives a
/// single top-level error instead of a run record. Everything else is
/// absorbed into the run record as a degraded or failed stage.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunError {
    /// The request topic was empty after trimming. No stage was executed.
    #[error("Topic must not be empty")]
    EmptyTopic,

    /// The caller abandoned the run; the partial run record was discarded.
    #[error("Run cancelled before stage {next_stage}")]
    Cancelled {
        /// The stage that would have run next.
        next_stage: Stage,
    },

    /// A stage was driven through an illegal status transition.
    ///
    /// Indicates a defect in the executor, not a service failure.
    #[error("Invalid transition for stage {stage}: {from} -> {to}")]
    InvalidStageTransition {
        /// Stage whose status was being changed.
        stage: Stage,
        /// Status before the attempted change.
        from: String,
        /// Requested status.
        to: String,
    },

    /// An outline reached the run record without passing validation.
    ///
    /// Indicates a defect in the executor, not a model failure.
    #[error("Outline rejected before storage: {message}")]
    InvalidOutline {
        /// The validation rule that was violated.
        message: String,
    },

    /// The pipeline configuration is invalid.
    ///
    /// Produced at construction time; a run never starts with an invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}
