//! Pipeline role implementations, the LLM gateway and the executor.
//!
//! This crate provides the default implementations of the three role ports
//! defined in [`pipeline`] (search gateway, outline builder, writer), the LLM
//! gateway that applies the per-call timeout to every generation request, and
//! the [`PipelineExecutor`] that drives Research → Outline → Write.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Nodes sequence calls between the domain rules in
//! the [`pipeline`] crate and the service ports (text generation, web search).
//! Concrete services are injected by the composition root.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`gateway`] | `LlmGateway` |
//! | [`research`] | `FailoverSearchGateway`, `ResearchSynthesizer` |
//! | [`outline`] | `LlmOutlineBuilder` with corrective retries |
//! | [`writer`] | `LlmWriter` |
//! | [`compliance`] | Outline-heading coverage check |
//! | [`prompts`] | Prompt text, style temperatures, length guides |
//! | [`executor`] | `PipelineExecutor` |

pub mod compliance;
pub mod executor;
pub mod gateway;
pub mod outline;
pub mod prompts;
pub mod research;
pub mod writer;

#[cfg(test)]
mod testing;

pub use executor::PipelineExecutor;
pub use gateway::LlmGateway;
pub use outline::LlmOutlineBuilder;
pub use research::{FailoverSearchGateway, ResearchSynthesizer};
pub use writer::LlmWriter;
