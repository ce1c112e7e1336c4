//! Core domain for the Tea Stall Bench content pipeline.
//!
//! This crate contains every domain concept, identifier, value type, port
//! trait, and error type used by the Research → Outline → Write pipeline.
//! Infrastructure crates implement the service ports defined here; the
//! `nodes` crate implements the role ports and the executor.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`TraceId`, `Topic`, `ProviderName`) |
//! | [`types`] | Shared value types (`Source`, `Article`, `Timestamp`, etc.) |
//! | [`outline`] | `Outline`, `Section` and their validation rules |
//! | [`stage`] | Stages, the status machine, and `StageOutcome` |
//! | [`state`] | `RunRequest`, `RunState`, `RunResponse` |
//! | [`ports`] | Service and role traits with their error types |
//! | [`settings`] | Read-only `PipelineSettings` |
//! | [`errors`] | Run-level errors and retry policy |

pub mod errors;
pub mod identifiers;
pub mod outline;
pub mod ports;
pub mod settings;
pub mod stage;
pub mod state;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{RetryPolicy, RunError};
pub use identifiers::{ProviderName, Topic, TraceId};
pub use outline::{strip_code_fences, Outline, OutlineValidationError, Section};
pub use ports::{
    ComplianceReport, Draft, GenerationError, OutlineBuild, OutlineBuilder, OutlineFailure,
    Research, SearchError, SearchGateway, SearchProvider, TextGenerator, WriteError, Writer,
    WritingBrief,
};
pub use settings::PipelineSettings;
pub use stage::{Stage, StageBoard, StageError, StageErrorKind, StageOutcome, StageStatus};
pub use state::{ContentOptions, RunRequest, RunResponse, RunState};
pub use types::{count_words, Article, GenerationRequest, SearchResults, Source, Timestamp};
