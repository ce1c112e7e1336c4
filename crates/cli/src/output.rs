//! Human-readable rendering of a run record.

use std::fmt::Write as _;

use pipeline::{RunResponse, Stage};

/// Renders the stage summary, any recorded errors, and the article.
pub fn render(response: &RunResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run {} ({})", response.trace_id, response.topic);

    let stages: Vec<String> = Stage::ALL
        .iter()
        .map(|stage| format!("{stage}: {}", response.stage_status.status(*stage)))
        .collect();
    let _ = writeln!(out, "Stages: {}", stages.join(" | "));

    if let Some(sources) = &response.research_sources {
        let _ = writeln!(out, "Sources: {}", sources.len());
        for source in sources {
            let _ = writeln!(out, "  - {} <{}>", source.title, source.url);
        }
    }
    if let Some(outline) = &response.outline {
        let _ = writeln!(out, "Outline: {}", outline.title);
        for (i, heading) in outline.headings().enumerate() {
            let _ = writeln!(out, "  {}. {heading}", i + 1);
        }
    }
    if !response.errors.is_empty() {
        let _ = writeln!(out, "Warnings:");
        for entry in &response.errors {
            let _ = writeln!(out, "  ! {entry}");
        }
    }

    match (&response.article_title, &response.article_content) {
        (Some(title), Some(content)) => {
            let words = response.word_count.unwrap_or_default();
            let underline = "=".repeat(title.chars().count());
            let _ = writeln!(out, "\n{title}\n{underline}\n\n{content}\n");
            let _ = writeln!(out, "({words} words)");
        }
        _ => {
            let _ = writeln!(out, "\nNo article was produced.");
        }
    }
    out
}
