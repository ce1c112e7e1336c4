//! LLM-backed outline builder with corrective retries.
//!
//! Each rejected response is fed back to the model together with the reason
//! it was rejected. When no valid outline is produced within the attempt
//! budget, the deterministic fallback outline is returned instead.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{GenerationRequest, Outline, OutlineBuild, OutlineBuilder, OutlineFailure, Topic};
use tracing::{debug, info, warn};

use crate::gateway::LlmGateway;
use crate::prompts;

struct Rejection {
    output: String,
    error: String,
}

/// Rejected outputs collected across attempts.
#[derive(Default)]
struct RetryFeedback {
    rejections: Vec<Rejection>,
}

impl RetryFeedback {
    fn record(&mut self, output: String, error: String) {
        self.rejections.push(Rejection { output, error });
    }

    /// The prompt for the next attempt: the base prompt plus the latest
    /// rejection and the reasons for any earlier ones.
    fn prompt(&self, base: &str) -> String {
        let Some((latest, earlier)) = self.rejections.split_last() else {
            return base.to_string();
        };
        let earlier: Vec<String> = earlier.iter().map(|r| r.error.clone()).collect();
        prompts::outline_retry_prompt(base, &latest.output, &latest.error, &earlier)
    }
}

/// Generates outlines through the [`LlmGateway`].
pub struct LlmOutlineBuilder {
    llm: LlmGateway,
    max_attempts: u32,
    retry_delay: Duration,
}

impl LlmOutlineBuilder {
    /// `max_attempts` is clamped to at least one.
    pub fn new(llm: LlmGateway, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            llm,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }
}

#[async_trait]
impl OutlineBuilder for LlmOutlineBuilder {
    async fn build(&self, topic: &Topic, research: Option<&str>) -> OutlineBuild {
        let base = prompts::outline_prompt(topic, research);
        let mut feedback = RetryFeedback::default();
        let mut prompt = base.clone();
        let mut attempts = 0;
        let mut last_error = String::new();

        while attempts < self.max_attempts {
            if attempts > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }
            attempts += 1;

            let request =
                GenerationRequest::new(prompt.clone()).with_temperature(prompts::OUTLINE_TEMPERATURE);
            let raw = match self.llm.generate(request).await {
                Ok(raw) => raw,
                Err(err) => {
                    last_error = err.to_string();
                    if err.retry_policy().is_retryable() {
                        warn!(attempt = attempts, error = %err, "Outline generation failed, retrying");
                        continue;
                    }
                    warn!(attempt = attempts, error = %err, "Outline generation failed permanently");
                    break;
                }
            };

            match Outline::parse(&raw) {
                Ok(outline) => {
                    info!(
                        attempt = attempts,
                        sections = outline.sections.len(),
                        "Outline accepted"
                    );
                    return OutlineBuild {
                        outline,
                        attempts,
                        failure: None,
                    };
                }
                Err(err) => {
                    warn!(attempt = attempts, error = %err, "Outline rejected");
                    debug!(output = %raw, "Rejected outline output");
                    last_error = err.to_string();
                    feedback.record(raw, last_error.clone());
                    prompt = feedback.prompt(&base);
                }
            }
        }

        warn!(attempts, error = %last_error, "Falling back to default outline");
        OutlineBuild {
            outline: Outline::fallback(topic),
            attempts,
            failure: Some(OutlineFailure {
                attempts,
                last_error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pipeline::GenerationError;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{outline_json, ScriptedGenerator};

    fn topic() -> Topic {
        Topic::new("Sourdough baking").unwrap()
    }

    fn builder(generator: Arc<ScriptedGenerator>, max_attempts: u32) -> LlmOutlineBuilder {
        LlmOutlineBuilder::new(
            LlmGateway::new(generator, Duration::from_secs(5)),
            max_attempts,
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_valid_first_response() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(outline_json(
            "Bread",
            &["Starter", "Baking"],
        ))]));
        let build = builder(generator.clone(), 3)
            .build(&topic(), Some("research"))
            .await;

        assert!(build.failure.is_none());
        assert_eq!(build.attempts, 1);
        assert_eq!(build.outline.headings().collect::<Vec<_>>(), vec!["Starter", "Baking"]);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_accepts_fenced_json() {
        let fenced = format!("```json\n{}\n```", outline_json("Bread", &["Starter"]));
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(fenced)]));
        let build = builder(generator, 3).build(&topic(), None).await;
        assert!(build.failure.is_none());
        assert_eq!(build.outline.title, "Bread");
    }

    #[tokio::test]
    async fn test_retries_carry_feedback_until_valid() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("not json at all".into()),
            Ok("{\"title\": \"Bread\", \"sections\": []}".into()),
            Ok(outline_json("Bread", &["Starter"])),
        ]));
        let build = builder(generator.clone(), 3).build(&topic(), None).await;

        assert!(build.failure.is_none());
        assert_eq!(build.attempts, 3);

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(!prompts[0].contains(prompts::FEEDBACK_MARKER));
        assert_eq!(
            prompts
                .iter()
                .filter(|p| p.contains(prompts::FEEDBACK_MARKER))
                .count(),
            2
        );
        assert!(prompts[1].contains("not json at all"));
        assert!(prompts[2].contains("outline has no sections"));
        assert!(prompts[2].contains("- output is not valid outline JSON"));
    }

    #[tokio::test]
    async fn test_zero_sections_is_retried() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("{\"title\": \"Bread\", \"sections\": []}".into()),
            Ok(outline_json("Bread", &["Starter"])),
        ]));
        let build = builder(generator.clone(), 3).build(&topic(), None).await;
        assert!(build.failure.is_none());
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_headings_are_rejected() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(outline_json("Bread", &["Starter", "starter"])),
            Ok(outline_json("Bread", &["Starter", "Shaping"])),
        ]));
        let build = builder(generator.clone(), 3).build(&topic(), None).await;
        assert!(build.failure.is_none());
        assert!(generator.prompts()[1].contains("duplicate section heading"));
    }

    #[tokio::test]
    async fn test_exhaustion_returns_fallback() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("nope".into()),
            Ok("still nope".into()),
            Ok("{\"title\": \"\", \"sections\": []}".into()),
        ]));
        let build = builder(generator.clone(), 3).build(&topic(), None).await;

        assert_eq!(build.outline, Outline::fallback(&topic()));
        assert_eq!(
            build.failure,
            Some(OutlineFailure {
                attempts: 3,
                last_error: "outline title is empty".into(),
            })
        );
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_transient_error_resends_same_prompt() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(GenerationError::Connection {
                message: "reset".into(),
            }),
            Ok(outline_json("Bread", &["Starter"])),
        ]));
        let build = builder(generator.clone(), 3).build(&topic(), None).await;

        assert!(build.failure.is_none());
        assert_eq!(build.attempts, 2);
        let prompts = generator.prompts();
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_early() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(
            GenerationError::Authentication {
                message: "bad key".into(),
            },
        )]));
        let build = builder(generator.clone(), 3).build(&topic(), None).await;

        assert_eq!(generator.calls(), 1);
        let failure = build.failure.unwrap();
        assert_eq!(failure.attempts, 1);
        assert!(failure.last_error.contains("bad key"));
        assert_eq!(build.outline, Outline::fallback(&topic()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("nope".into()),
            Ok(outline_json("Bread", &["Starter"])),
        ]));
        let builder = LlmOutlineBuilder::new(
            LlmGateway::new(generator, Duration::from_secs(5)),
            3,
            Duration::from_millis(250),
        );
        let started = tokio::time::Instant::now();
        let build = builder.build(&topic(), None).await;
        assert!(build.failure.is_none());
        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}
