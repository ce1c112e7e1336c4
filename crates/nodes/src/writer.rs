//! LLM-backed writer.
//!
//! The generated text is split into a title and a body, and the whole text
//! is checked against the outline headings. Non-compliant text is returned
//! as-is; the verdict travels alongside it in the [`Draft`].

use async_trait::async_trait;
use pipeline::{Article, Draft, GenerationRequest, Outline, WriteError, Writer, WritingBrief};
use tracing::{info, warn};

use crate::compliance;
use crate::gateway::LlmGateway;
use crate::prompts;

const MAX_DERIVED_TITLE_CHARS: usize = 100;

/// Generates articles through the [`LlmGateway`].
pub struct LlmWriter {
    llm: LlmGateway,
    research_excerpt_chars: usize,
}

impl LlmWriter {
    pub fn new(llm: LlmGateway, research_excerpt_chars: usize) -> Self {
        Self {
            llm,
            research_excerpt_chars,
        }
    }
}

#[async_trait]
impl Writer for LlmWriter {
    async fn write(&self, brief: WritingBrief<'_>) -> Result<Draft, WriteError> {
        let prompt = prompts::writing_prompt(&brief, self.research_excerpt_chars);
        let temperature = prompts::style_temperature(&brief.options.style);
        let text = self
            .llm
            .generate(GenerationRequest::new(prompt).with_temperature(temperature))
            .await?;
        if text.trim().is_empty() {
            return Err(WriteError::EmptyOutput);
        }

        let compliance = compliance::check(brief.outline, &text);
        let (title, body) = split_title(&text, brief.outline);
        let article = Article::new(title, body);

        if compliance.is_compliant() {
            info!(words = article.word_count, "Article written");
        } else {
            warn!(
                words = article.word_count,
                missing = ?compliance.missing_headings,
                "Article does not address every outline heading"
            );
        }
        Ok(Draft {
            article,
            compliance,
        })
    }
}

fn strip_title_prefix(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches('#').trim_start();
    match line.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("title:") => line[6..].trim(),
        _ => line,
    }
}

/// Splits generated text into `(title, body)`.
///
/// The first non-empty line, without `#` or `Title:` markers, is the title.
/// Text with nothing after that line is kept whole as the body and the title
/// is derived from its first characters. A first line that is one of the
/// outline headings opens the body; the outline title is used instead.
fn split_title(text: &str, outline: &Outline) -> (String, String) {
    let text = text.trim();
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let title = strip_title_prefix(first);
    let body = rest.trim();

    if outline
        .headings()
        .any(|heading| heading.trim().eq_ignore_ascii_case(title))
    {
        return (outline.title.clone(), text.to_string());
    }

    if body.is_empty() || title.is_empty() {
        let derived = prompts::excerpt(title, MAX_DERIVED_TITLE_CHARS);
        return (derived.to_string(), text.to_string());
    }
    (title.to_string(), body.to_string())
}
