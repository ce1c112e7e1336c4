//! The run request, the per-run state record, and the response handed back
//! to the caller.
//!
//! A [`RunState`] is created once per request by [`RunState::start`], owned
//! exclusively by the executor while the stages run, and consumed by
//! [`RunState::complete`], which stamps the completion time exactly once and
//! produces the [`RunResponse`].

use serde::{Deserialize, Serialize};

use crate::{
    Article, Outline, OutlineValidationError, Research, RunError, Source, Stage, StageBoard,
    StageOutcome, StageStatus, Timestamp, Topic, TraceId,
};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Pass-through content settings forwarded to prompt construction.
///
/// Values are not validated by the pipeline; unknown values fall back to
/// neutral prompt defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentOptions {
    pub content_type: String,
    pub style: String,
    pub length: String,
    pub channel: String,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            content_type: "blog".into(),
            style: "professional".into(),
            length: "medium".into(),
            channel: "blog".into(),
        }
    }
}

/// A request to run the pipeline for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub topic: String,
    #[serde(flatten)]
    pub options: ContentOptions,
}

impl RunRequest {
    /// Creates a request with default content options.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            options: ContentOptions::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The single record threaded through one pipeline run.
#[derive(Debug, Clone)]
pub struct RunState {
    trace_id: TraceId,
    topic: Topic,
    options: ContentOptions,
    started_at: Timestamp,
    completed_at: Option<Timestamp>,
    research_text: Option<String>,
    research_sources: Vec<Source>,
    outline: Option<Outline>,
    article: Option<Article>,
    errors: Vec<String>,
    stage_status: StageBoard,
}

impl RunState {
    /// Validates the request and opens a new run.
    ///
    /// Fails with [`RunError::EmptyTopic`] when the topic is blank; no state
    /// exists in that case.
    pub fn start(request: RunRequest) -> Result<Self, RunError> {
        let topic = Topic::new(request.topic).ok_or(RunError::EmptyTopic)?;
        Ok(Self {
            trace_id: TraceId::new_random(),
            topic,
            options: request.options,
            started_at: Timestamp::now(),
            completed_at: None,
            research_text: None,
            research_sources: Vec::new(),
            outline: None,
            article: None,
            errors: Vec::new(),
            stage_status: StageBoard::new(),
        })
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn options(&self) -> &ContentOptions {
        &self.options
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn research_text(&self) -> Option<&str> {
        self.research_text.as_deref()
    }

    pub fn research_sources(&self) -> &[Source] {
        &self.research_sources
    }

    pub fn outline(&self) -> Option<&Outline> {
        self.outline.as_ref()
    }

    pub fn article(&self) -> Option<&Article> {
        self.article.as_ref()
    }

    /// Stage-prefixed error entries in the order they were recorded.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn stage_status(&self) -> &StageBoard {
        &self.stage_status
    }

    /// Marks `stage` active.
    pub fn begin_stage(&mut self, stage: Stage) -> Result<(), RunError> {
        self.stage_status.transition(stage, StageStatus::Active)
    }

    /// Applies a stage's terminal status, records its error (if any) and
    /// returns its value for the caller to store.
    pub fn finish_stage<T>(
        &mut self,
        stage: Stage,
        outcome: StageOutcome<T>,
    ) -> Result<Option<T>, RunError> {
        self.stage_status.transition(stage, outcome.status)?;
        if let Some(error) = outcome.error {
            self.errors.push(error.render(stage));
        }
        Ok(outcome.value)
    }

    /// Stores research produced by the Research stage.
    pub fn record_research(&mut self, research: Research) {
        self.research_text = Some(research.text);
        self.research_sources = research.sources;
    }

    /// Stores an outline after re-checking every rule, so a partially valid
    /// outline can never be held in the run.
    pub fn record_outline(&mut self, outline: Outline) -> Result<(), OutlineValidationError> {
        outline.validate()?;
        self.outline = Some(outline);
        Ok(())
    }

    /// Stores the written article.
    pub fn record_article(&mut self, article: Article) {
        self.article = Some(article);
    }

    /// Stamps the completion time and converts the run into its response.
    ///
    /// Every stage must have reached a terminal status.
    pub fn complete(mut self) -> Result<RunResponse, RunError> {
        if let Some((stage, status)) = self.stage_status.iter().find(|(_, s)| !s.is_terminal()) {
            return Err(RunError::InvalidStageTransition {
                stage,
                from: status.to_string(),
                to: "completed".into(),
            });
        }
        let completed_at = Timestamp::now();
        self.completed_at = Some(completed_at);

        let research_sources = self
            .research_text
            .as_ref()
            .map(|_| std::mem::take(&mut self.research_sources));
        let (article_title, article_content, word_count) = match self.article {
            Some(article) => (
                Some(article.title),
                Some(article.text),
                Some(article.word_count),
            ),
            None => (None, None, None),
        };

        Ok(RunResponse {
            trace_id: self.trace_id,
            topic: self.topic.to_string(),
            research_data: self.research_text,
            research_sources,
            outline: self.outline,
            article_title,
            article_content,
            word_count,
            started_at: self.started_at,
            completed_at,
            errors: self.errors,
            stage_status: self.stage_status,
        })
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The trace returned to the caller for one completed run.
///
/// Absent optional fields mean the producing stage never yielded usable
/// output; `errors` entries are prefixed with the stage label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub trace_id: TraceId,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_sources: Option<Vec<Source>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<Outline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    pub started_at: Timestamp,
    pub completed_at: Timestamp,
    pub errors: Vec<String>,
    pub stage_status: StageBoard,
}
