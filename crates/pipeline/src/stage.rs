//! Pipeline stages, their status machine, and the tagged result each stage
//! hands back to the executor.
//!
//! Every stage moves `Pending -> Active -> {Done | Degraded | Failed}` exactly
//! once per run. [`StageBoard`] enforces that; any other transition is a
//! [`RunError::InvalidStageTransition`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::RunError;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One unit of sequential pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Outline,
    Write,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Research, Stage::Outline, Stage::Write];

    /// Prefix used for this stage's entries in `RunState.errors`.
    ///
    /// Consumers match on these prefixes to attribute failures, e.g. an entry
    /// beginning with `"Research failed"` marks the Research card as failed.
    pub fn error_label(self) -> &'static str {
        match self {
            Stage::Research => "Research",
            Stage::Outline => "Outline",
            Stage::Write => "Writing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Research => "Research",
            Stage::Outline => "Outline",
            Stage::Write => "Write",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a single stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Active,
    /// Completed on the primary path.
    Done,
    /// Completed through a fallback or incomplete path.
    Degraded,
    /// Produced no usable output.
    Failed,
}

impl StageStatus {
    /// Returns `true` for `Done`, `Degraded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageStatus::Done | StageStatus::Degraded | StageStatus::Failed
        )
    }

    fn can_transition_to(self, next: StageStatus) -> bool {
        match (self, next) {
            (StageStatus::Pending, StageStatus::Active) => true,
            (StageStatus::Active, n) => n.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageStatus::Pending => "pending",
            StageStatus::Active => "active",
            StageStatus::Done => "done",
            StageStatus::Degraded => "degraded",
            StageStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Status of every stage in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageBoard(BTreeMap<Stage, StageStatus>);

impl StageBoard {
    /// Creates a board with every stage `Pending`.
    pub fn new() -> Self {
        Self(
            Stage::ALL
                .into_iter()
                .map(|s| (s, StageStatus::Pending))
                .collect(),
        )
    }

    /// Current status of `stage`.
    pub fn status(&self, stage: Stage) -> StageStatus {
        self.0.get(&stage).copied().unwrap_or(StageStatus::Pending)
    }

    /// Moves `stage` to `next`, rejecting anything but
    /// `Pending -> Active -> terminal`.
    pub fn transition(&mut self, stage: Stage, next: StageStatus) -> Result<(), RunError> {
        let current = self.status(stage);
        if !current.can_transition_to(next) {
            return Err(RunError::InvalidStageTransition {
                stage,
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        self.0.insert(stage, next);
        Ok(())
    }

    /// Iterates stages in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, StageStatus)> + '_ {
        self.0.iter().map(|(s, st)| (*s, *st))
    }
}

impl Default for StageBoard {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Whether a recorded stage error reports a failure or a degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageErrorKind {
    /// The stage's own work failed (a substitute may still have been used).
    Failed,
    /// The stage produced real output through a backup or incomplete path.
    Degraded,
}

/// An error attached to a [`StageOutcome`], rendered with the stage prefix
/// when it is recorded in the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub kind: StageErrorKind,
    pub message: String,
}

impl StageError {
    /// Renders the entry recorded in `RunState.errors`, e.g.
    /// `"Research failed: both providers timed out"`.
    pub fn render(&self, stage: Stage) -> String {
        let verb = match self.kind {
            StageErrorKind::Failed => "failed",
            StageErrorKind::Degraded => "degraded",
        };
        format!("{} {verb}: {}", stage.error_label(), self.message)
    }
}

/// The tagged `(value, status, error)` result of one stage.
///
/// Stages never raise; the executor reads the status and error to decide how
/// the next stage proceeds and what is recorded in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    /// Output, absent when the stage failed.
    pub value: Option<T>,
    /// Terminal status; never `Pending` or `Active`.
    pub status: StageStatus,
    pub error: Option<StageError>,
}

impl<T> StageOutcome<T> {
    /// Full success.
    pub fn done(value: T) -> Self {
        Self {
            value: Some(value),
            status: StageStatus::Done,
            error: None,
        }
    }

    /// Real output produced through a backup or incomplete path.
    pub fn degraded(value: T, message: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            status: StageStatus::Degraded,
            error: Some(StageError {
                kind: StageErrorKind::Degraded,
                message: message.into(),
            }),
        }
    }

    /// The stage failed but a deterministic substitute keeps the run going.
    pub fn substituted(value: T, message: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            status: StageStatus::Degraded,
            error: Some(StageError {
                kind: StageErrorKind::Failed,
                message: message.into(),
            }),
        }
    }

    /// No usable output.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            value: None,
            status: StageStatus::Failed,
            error: Some(StageError {
                kind: StageErrorKind::Failed,
                message: message.into(),
            }),
        }
    }
}
