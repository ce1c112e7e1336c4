//! The pipeline executor: drives Research → Outline → Write for one run.
//!
//! Stages run strictly in order inside a single task. Each stage produces a
//! [`StageOutcome`]; only [`RunError`]s stop the run. Cancellation is checked
//! before each stage and never interrupts an in-flight call.

use std::sync::Arc;

use pipeline::{
    Article, Outline, OutlineBuilder, OutlineFailure, PipelineSettings, Research, RunError,
    RunRequest, RunResponse, RunState, SearchGateway, SearchProvider, Stage, StageOutcome,
    StageStatus, TextGenerator, Topic, Writer, WritingBrief,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::gateway::LlmGateway;
use crate::outline::LlmOutlineBuilder;
use crate::research::{FailoverSearchGateway, ResearchSynthesizer};
use crate::writer::LlmWriter;

/// Runs the content pipeline with injected role implementations.
///
/// Holds only shared, read-only collaborators, so one executor can serve
/// concurrent runs.
#[derive(Clone)]
pub struct PipelineExecutor {
    search: Arc<dyn SearchGateway>,
    outliner: Arc<dyn OutlineBuilder>,
    writer: Arc<dyn Writer>,
    synthesizer: Option<ResearchSynthesizer>,
}

impl PipelineExecutor {
    pub fn new(
        search: Arc<dyn SearchGateway>,
        outliner: Arc<dyn OutlineBuilder>,
        writer: Arc<dyn Writer>,
    ) -> Self {
        Self {
            search,
            outliner,
            writer,
            synthesizer: None,
        }
    }

    /// Condenses raw search text into a research report before outlining.
    pub fn with_research_synthesis(mut self, synthesizer: ResearchSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Wires the default LLM-backed roles from `settings`.
    pub fn from_settings(
        settings: &PipelineSettings,
        generator: Arc<dyn TextGenerator>,
        primary: Arc<dyn SearchProvider>,
        secondary: Option<Arc<dyn SearchProvider>>,
    ) -> Result<Self, RunError> {
        settings.validate()?;

        let llm = LlmGateway::new(generator, settings.generation_timeout());
        let search = FailoverSearchGateway::new(primary, secondary, settings.search_timeout());
        let outliner = LlmOutlineBuilder::new(
            llm.clone(),
            settings.outline_max_attempts,
            settings.outline_retry_delay(),
        );
        let writer = LlmWriter::new(llm.clone(), settings.research_excerpt_chars);

        let executor = Self::new(Arc::new(search), Arc::new(outliner), Arc::new(writer));
        Ok(if settings.summarize_research {
            executor.with_research_synthesis(ResearchSynthesizer::new(llm))
        } else {
            executor
        })
    }

    /// Runs the pipeline to completion.
    pub async fn run(&self, request: RunRequest) -> Result<RunResponse, RunError> {
        self.run_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Runs the pipeline, stopping at the next stage boundary once `cancel`
    /// fires. A cancelled run returns [`RunError::Cancelled`] and its partial
    /// state is discarded.
    pub async fn run_with_cancel(
        &self,
        request: RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunResponse, RunError> {
        let state = RunState::start(request)?;
        let span = info_span!(
            "pipeline_run",
            trace_id = %state.trace_id(),
            topic = %state.topic(),
        );
        self.drive(state, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        mut state: RunState,
        cancel: &CancellationToken,
    ) -> Result<RunResponse, RunError> {
        info!("Pipeline run started");

        checkpoint(cancel, Stage::Research)?;
        state.begin_stage(Stage::Research)?;
        let outcome = self.research(state.topic()).await;
        if let Some(research) = finish(&mut state, Stage::Research, outcome)? {
            state.record_research(research);
        }

        checkpoint(cancel, Stage::Outline)?;
        state.begin_stage(Stage::Outline)?;
        let outcome = self.outline(state.topic(), state.research_text()).await;
        if let Some(outline) = finish(&mut state, Stage::Outline, outcome)? {
            state
                .record_outline(outline)
                .map_err(|err| RunError::InvalidOutline {
                    message: err.to_string(),
                })?;
        }

        checkpoint(cancel, Stage::Write)?;
        state.begin_stage(Stage::Write)?;
        let outline = state
            .outline()
            .cloned()
            .unwrap_or_else(|| Outline::fallback(state.topic()));
        let brief = WritingBrief {
            topic: state.topic(),
            research: state.research_text(),
            outline: &outline,
            options: state.options(),
        };
        let outcome = self.write(brief).await;
        if let Some(article) = finish(&mut state, Stage::Write, outcome)? {
            state.record_article(article);
        }

        let response = state.complete()?;
        info!(errors = response.errors.len(), "Pipeline run completed");
        Ok(response)
    }

    async fn research(&self, topic: &Topic) -> StageOutcome<Research> {
        let mut research = match self.search.fetch(topic).await {
            Ok(research) => research,
            Err(err) => return StageOutcome::failed(err.to_string()),
        };

        if let Some(synthesizer) = &self.synthesizer {
            match synthesizer.synthesize(topic, &research).await {
                Ok(report) => research.text = report,
                Err(err) => warn!(error = %err, "Research synthesis failed, keeping raw results"),
            }
        }

        if research.used_fallback {
            let reason = research
                .primary_failure
                .clone()
                .unwrap_or_else(|| "unknown error".into());
            let message = format!(
                "primary search provider failed ({reason}); used {}",
                research.provider
            );
            StageOutcome::degraded(research, message)
        } else {
            StageOutcome::done(research)
        }
    }

    async fn outline(&self, topic: &Topic, research: Option<&str>) -> StageOutcome<Outline> {
        let build = self.outliner.build(topic, research).await;
        let (outline, failure) = match build.outline.validate() {
            Ok(()) => (build.outline, build.failure),
            Err(err) => {
                error!(error = %err, "Outline builder returned an invalid outline");
                let failure = OutlineFailure {
                    attempts: build.attempts,
                    last_error: err.to_string(),
                };
                (Outline::fallback(topic), Some(failure))
            }
        };
        match failure {
            None => StageOutcome::done(outline),
            Some(failure) => StageOutcome::substituted(outline, failure.to_string()),
        }
    }

    async fn write(&self, brief: WritingBrief<'_>) -> StageOutcome<Article> {
        match self.writer.write(brief).await {
            Ok(draft) if draft.compliance.is_compliant() => StageOutcome::done(draft.article),
            Ok(draft) => {
                let message = format!(
                    "article does not address every outline section; missing heading(s): {}",
                    draft.compliance.missing_headings.join(", ")
                );
                StageOutcome::degraded(draft.article, message)
            }
            Err(err) => StageOutcome::failed(err.to_string()),
        }
    }
}

fn checkpoint(cancel: &CancellationToken, next_stage: Stage) -> Result<(), RunError> {
    if cancel.is_cancelled() {
        info!(stage = %next_stage, "Run cancelled");
        return Err(RunError::Cancelled { next_stage });
    }
    Ok(())
}

fn finish<T>(
    state: &mut RunState,
    stage: Stage,
    outcome: StageOutcome<T>,
) -> Result<Option<T>, RunError> {
    let message = outcome.error.as_ref().map(|e| e.message.as_str());
    match outcome.status {
        StageStatus::Failed => warn!(stage = %stage, error = ?message, "Stage failed"),
        StageStatus::Degraded => warn!(stage = %stage, error = ?message, "Stage degraded"),
        status => info!(stage = %stage, status = %status, "Stage finished"),
    }
    state.finish_stage(stage, outcome)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pipeline::{OutlineBuild, SearchError, Section};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::prompts::FEEDBACK_MARKER;
    use crate::testing::{outline_json, provider_name, ScriptedGenerator, StaticSearch};

    const ARTICLE: &str = "# Mastering Tea\n\n## Origins\nTea began in China.\n\n## Brewing\nUse fresh water.";

    fn settings() -> PipelineSettings {
        PipelineSettings {
            outline_retry_delay_ms: 0,
            ..PipelineSettings::default()
        }
    }

    fn executor(
        generator: Arc<ScriptedGenerator>,
        primary: Arc<StaticSearch>,
        secondary: Option<Arc<StaticSearch>>,
    ) -> PipelineExecutor {
        PipelineExecutor::from_settings(
            &settings(),
            generator,
            primary,
            secondary.map(|s| s as Arc<dyn SearchProvider>),
        )
        .unwrap()
    }

    fn happy_generator() -> Arc<ScriptedGenerator> {
        Arc::new(ScriptedGenerator::new(vec![
            Ok(outline_json("Mastering Tea", &["Origins", "Brewing"])),
            Ok(ARTICLE.into()),
        ]))
    }

    fn healthy_search() -> (Arc<StaticSearch>, Option<Arc<StaticSearch>>) {
        (
            Arc::new(StaticSearch::ok("parallel", "Tea is grown in China and India.")),
            Some(Arc::new(StaticSearch::ok("duckduckgo", "backup text"))),
        )
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (primary, secondary) = healthy_search();
        let response = executor(happy_generator(), primary, secondary)
            .run(RunRequest::new("Tea"))
            .await
            .unwrap();

        assert!(response.errors.is_empty());
        for stage in Stage::ALL {
            assert_eq!(response.stage_status.status(stage), StageStatus::Done);
        }
        assert_eq!(
            response.research_data.as_deref(),
            Some("Tea is grown in China and India.")
        );
        assert_eq!(response.research_sources.unwrap().len(), 1);
        assert_eq!(response.outline.unwrap().sections.len(), 2);
        assert_eq!(response.article_title.as_deref(), Some("Mastering Tea"));
        assert!(response.article_content.unwrap().contains("## Brewing"));
        assert_eq!(response.word_count, Some(11));
    }

    #[tokio::test]
    async fn test_runs_get_unique_trace_ids_and_ordered_timestamps() {
        let mut seen = Vec::new();
        for _ in 0..2 {
            let (primary, secondary) = healthy_search();
            let response = executor(happy_generator(), primary, secondary)
                .run(RunRequest::new("Tea"))
                .await
                .unwrap();
            assert!(response.completed_at >= response.started_at);
            seen.push(response.trace_id);
        }
        assert_ne!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn test_empty_topic_runs_no_stage() {
        let generator = happy_generator();
        let (primary, secondary) = healthy_search();
        let err = executor(generator.clone(), primary.clone(), secondary)
            .run(RunRequest::new("  \t "))
            .await
            .unwrap_err();

        assert_eq!(err, RunError::EmptyTopic);
        assert_eq!(primary.calls(), 0);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_fallback_degrades_research() {
        let primary = Arc::new(StaticSearch::failing("parallel"));
        let secondary = Arc::new(StaticSearch::ok("duckduckgo", "backup text"));
        let response = executor(happy_generator(), primary, Some(secondary))
            .run(RunRequest::new("Tea"))
            .await
            .unwrap();

        assert_eq!(
            response.stage_status.status(Stage::Research),
            StageStatus::Degraded
        );
        assert_eq!(response.research_data.as_deref(), Some("backup text"));
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].starts_with("Research degraded: primary search provider failed"));
        assert!(response.errors[0].ends_with("used duckduckgo"));
    }

    #[tokio::test]
    async fn test_both_search_providers_fail() {
        let generator = happy_generator();
        let primary = Arc::new(StaticSearch::failing("parallel"));
        let secondary = Arc::new(StaticSearch::empty("duckduckgo"));
        let response = executor(generator.clone(), primary, Some(secondary))
            .run(RunRequest::new("Tea"))
            .await
            .unwrap();

        assert_eq!(
            response.stage_status.status(Stage::Research),
            StageStatus::Failed
        );
        assert!(response.research_data.is_none());
        assert!(response.research_sources.is_none());
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].starts_with("Research failed: research unavailable"));

        // The run continues without research.
        assert_eq!(response.stage_status.status(Stage::Write), StageStatus::Done);
        assert!(generator.prompts()[0].contains("No research is available"));
    }

    #[tokio::test]
    async fn test_outline_recovers_after_two_malformed_responses() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("Sure! Here is your outline".into()),
            Ok("{\"title\": \"Mastering Tea\"}".into()),
            Ok(outline_json("Mastering Tea", &["Origins", "Brewing"])),
            Ok(ARTICLE.into()),
        ]));
        let (primary, secondary) = healthy_search();
        let response = executor(generator.clone(), primary, secondary)
            .run(RunRequest::new("Tea"))
            .await
            .unwrap();

        assert!(response.errors.is_empty());
        assert_eq!(
            response.stage_status.status(Stage::Outline),
            StageStatus::Done
        );
        let feedback_prompts = generator
            .prompts()
            .iter()
            .filter(|p| p.contains(FEEDBACK_MARKER))
            .count();
        assert_eq!(feedback_prompts, 2);
    }

    #[tokio::test]
    async fn test_never_valid_outline_uses_fallback() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("nope".into()),
            Ok("nope".into()),
            Ok("nope".into()),
            Ok("Tea\n\nTea is a drink people enjoy everywhere.".into()),
        ]));
        let (primary, secondary) = healthy_search();
        let response = executor(generator, primary, secondary)
            .run(RunRequest::new("Tea"))
            .await
            .unwrap();

        let topic = Topic::new("Tea").unwrap();
        assert_eq!(response.outline, Some(Outline::fallback(&topic)));
        assert_eq!(
            response.stage_status.status(Stage::Outline),
            StageStatus::Degraded
        );
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].starts_with("Outline failed: no valid outline after 3 attempt(s)"));
        assert_eq!(response.stage_status.status(Stage::Write), StageStatus::Done);
        assert!(response.article_content.is_some());
    }

    /// Reports success while handing back an outline with a blank heading.
    struct BrokenOutliner;

    #[async_trait]
    impl OutlineBuilder for BrokenOutliner {
        async fn build(&self, _topic: &Topic, _research: Option<&str>) -> OutlineBuild {
            OutlineBuild {
                outline: Outline {
                    title: "Mastering Tea".into(),
                    sections: vec![Section {
                        heading: "  ".into(),
                        key_points: vec!["Leaves".into()],
                    }],
                },
                attempts: 1,
                failure: None,
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_outline_from_builder_is_replaced_by_fallback() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            "Tea\n\nTea is a drink people enjoy everywhere.".into(),
        )]));
        let llm = LlmGateway::new(generator, std::time::Duration::from_secs(5));
        let (primary, _) = healthy_search();
        let executor = PipelineExecutor::new(
            Arc::new(FailoverSearchGateway::new(
                primary,
                None,
                std::time::Duration::from_secs(5),
            )),
            Arc::new(BrokenOutliner),
            Arc::new(LlmWriter::new(llm, 2000)),
        );

        let response = executor.run(RunRequest::new("Tea")).await.unwrap();

        let topic = Topic::new("Tea").unwrap();
        assert_eq!(response.outline, Some(Outline::fallback(&topic)));
        assert_eq!(
            response.stage_status.status(Stage::Outline),
            StageStatus::Degraded
        );
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].starts_with("Outline failed: "));
        assert_eq!(response.stage_status.status(Stage::Write), StageStatus::Done);
    }

    #[tokio::test]
    async fn test_missing_heading_degrades_writing() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(outline_json("Mastering Tea", &["Origins", "Brewing", "Health Effects"])),
            Ok(ARTICLE.into()),
        ]));
        let (primary, secondary) = healthy_search();
        let response = executor(generator, primary, secondary)
            .run(RunRequest::new("Tea"))
            .await
            .unwrap();

        assert_eq!(
            response.stage_status.status(Stage::Write),
            StageStatus::Degraded
        );
        assert!(response.article_content.unwrap().contains("## Origins"));
        assert_eq!(
            response.errors,
            vec![
                "Writing degraded: article does not address every outline section; missing heading(s): Health Effects"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_writer_failure_leaves_article_absent() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(outline_json("Mastering Tea", &["Origins"])),
            Ok("   ".into()),
        ]));
        let (primary, secondary) = healthy_search();
        let response = executor(generator, primary, secondary)
            .run(RunRequest::new("Tea"))
            .await
            .unwrap();

        assert_eq!(
            response.stage_status.status(Stage::Write),
            StageStatus::Failed
        );
        assert!(response.article_title.is_none());
        assert!(response.article_content.is_none());
        assert!(response.word_count.is_none());
        assert_eq!(
            response.errors,
            vec!["Writing failed: generation returned empty text".to_string()]
        );
    }

    #[tokio::test]
    async fn test_research_synthesis_replaces_raw_text() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("## Executive Summary\nTea matters.".into()),
            Ok(outline_json("Mastering Tea", &["Origins", "Brewing"])),
            Ok(ARTICLE.into()),
        ]));
        let (primary, secondary) = healthy_search();
        let settings = PipelineSettings {
            summarize_research: true,
            ..settings()
        };
        let response = PipelineExecutor::from_settings(
            &settings,
            generator,
            primary,
            secondary.map(|s| s as Arc<dyn SearchProvider>),
        )
        .unwrap()
        .run(RunRequest::new("Tea"))
        .await
        .unwrap();

        assert_eq!(
            response.research_data.as_deref(),
            Some("## Executive Summary\nTea matters.")
        );
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let generator = happy_generator();
        let (primary, secondary) = healthy_search();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor(generator.clone(), primary.clone(), secondary)
            .run_with_cancel(RunRequest::new("Tea"), &cancel)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RunError::Cancelled {
                next_stage: Stage::Research
            }
        );
        assert_eq!(primary.calls(), 0);
        assert_eq!(generator.calls(), 0);
    }

    /// Finishes the search, then cancels the run.
    struct CancellingSearch {
        cancel: CancellationToken,
    }

    #[async_trait]
    impl SearchGateway for CancellingSearch {
        async fn fetch(&self, _topic: &Topic) -> Result<Research, SearchError> {
            self.cancel.cancel();
            Ok(Research {
                text: "research".into(),
                sources: vec![],
                provider: provider_name("parallel"),
                used_fallback: false,
                primary_failure: None,
            })
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_at_next_stage_boundary() {
        let generator = happy_generator();
        let llm = LlmGateway::new(generator.clone(), std::time::Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let executor = PipelineExecutor::new(
            Arc::new(CancellingSearch {
                cancel: cancel.clone(),
            }),
            Arc::new(LlmOutlineBuilder::new(
                llm.clone(),
                3,
                std::time::Duration::ZERO,
            )),
            Arc::new(LlmWriter::new(llm, 2000)),
        );

        let err = executor
            .run_with_cancel(RunRequest::new("Tea"), &cancel)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RunError::Cancelled {
                next_stage: Stage::Outline
            }
        );
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let (primary, _) = healthy_search();
        let settings = PipelineSettings {
            outline_max_attempts: 0,
            ..PipelineSettings::default()
        };
        let result = PipelineExecutor::from_settings(
            &settings,
            happy_generator(),
            primary,
            None,
        );
        assert!(matches!(result, Err(RunError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_response_serializes_without_absent_fields() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(outline_json("Mastering Tea", &["Origins"])),
            Err(pipeline::GenerationError::Authentication {
                message: "bad key".into(),
            }),
        ]));
        let primary = Arc::new(StaticSearch::failing("parallel"));
        let response = executor(generator, primary, None)
            .run(RunRequest::new("Tea"))
            .await
            .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("research_data"));
        assert!(!object.contains_key("article_content"));
        assert!(object.contains_key("outline"));
        assert_eq!(json["stage_status"]["research"], "failed");
        assert_eq!(json["stage_status"]["write"], "failed");
    }
}
