//! Prompt construction for every generation call the pipeline makes.
//!
//! Content options are opaque strings; unknown styles, channels and lengths
//! fall back to neutral defaults rather than failing.

use pipeline::{Outline, Topic, WritingBrief};

/// Sampling temperature for outline generation. Structured output favours
/// low randomness.
pub const OUTLINE_TEMPERATURE: f32 = 0.3;

/// Sampling temperature for research synthesis.
pub const RESEARCH_TEMPERATURE: f32 = 0.3;

const DEFAULT_STYLE_TEMPERATURE: f32 = 0.7;
const DEFAULT_LENGTH_GUIDE: &str = "600-1000 words";
const NO_RESEARCH: &str = "No research is available; rely on general knowledge.";

/// Marker opening every corrective retry section.
pub const FEEDBACK_MARKER: &str = "Your previous response was rejected.";

/// Maps a writing style to a sampling temperature, factual to creative.
pub fn style_temperature(style: &str) -> f32 {
    match style.to_ascii_lowercase().as_str() {
        "technical" => 0.3,
        "educational" => 0.5,
        "professional" => 0.6,
        "friendly" => 0.75,
        "inspirational" => 0.8,
        "storytelling" => 0.9,
        _ => DEFAULT_STYLE_TEMPERATURE,
    }
}

/// Target word range for a channel and length.
pub fn length_guide(channel: &str, length: &str) -> &'static str {
    let channel = channel.to_ascii_lowercase();
    let length = length.to_ascii_lowercase();
    match (channel.as_str(), length.as_str()) {
        ("instagram", "short") => "50-100 words",
        ("instagram", "medium") => "100-150 words",
        ("instagram", "long") => "150-200 words",
        ("whatsapp", "short") => "100-200 words",
        ("whatsapp", "medium") => "200-400 words",
        ("whatsapp", "long") => "400-600 words",
        ("linkedin", "short") => "150-300 words",
        ("linkedin", "medium") => "300-600 words",
        ("linkedin", "long") => "600-1000 words",
        ("email", "short") => "200-400 words",
        ("email", "medium") => "400-800 words",
        ("email", "long") => "800-1200 words",
        ("blog", "short") => "300-500 words",
        ("blog", "medium") => "600-1000 words",
        ("blog", "long") => "1200-1800 words",
        _ => DEFAULT_LENGTH_GUIDE,
    }
}

/// Returns at most `max_chars` characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// First-attempt prompt for an outline.
pub fn outline_prompt(topic: &Topic, research: Option<&str>) -> String {
    let research = research
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(NO_RESEARCH);
    format!(
        r#"You are an expert content strategist.
Create a structured outline for an article about: "{topic}"

Research:
{research}

Instructions:
1. Identify the key themes in the research.
2. Structure the content logically (introduction, body sections, conclusion).
3. Give every section a distinct heading and at least one specific key point.
4. Output MUST be valid JSON matching this schema:

{{
    "title": "Catchy Title",
    "sections": [
        {{
            "heading": "Section Heading",
            "key_points": ["Point 1", "Point 2"]
        }}
    ]
}}

Provide ONLY the JSON output. No markdown, no conversational text."#
    )
}

/// Retry prompt carrying the rejected output and the reason it was rejected.
///
/// `earlier_errors` lists the reasons for rejections before the latest one.
pub fn outline_retry_prompt(
    base_prompt: &str,
    rejected_output: &str,
    error: &str,
    earlier_errors: &[String],
) -> String {
    let mut prompt = format!(
        "{base_prompt}\n\n{FEEDBACK_MARKER}\n\nPrevious response:\n<<<\n{}\n>>>\n\nProblem: {error}\n",
        rejected_output.trim()
    );
    if !earlier_errors.is_empty() {
        prompt.push_str("\nEarlier attempts were also rejected for:\n");
        for earlier in earlier_errors {
            prompt.push_str(&format!("- {earlier}\n"));
        }
    }
    prompt.push_str("\nFix the problem and provide ONLY valid JSON matching the schema.");
    prompt
}

/// Prompt asking the model to condense raw search output into a report.
pub fn research_summary_prompt(topic: &Topic, raw_results: &str) -> String {
    format!(
        r#"You are a research assistant. Synthesize the search results into a factual report.

TOPIC: {topic}

SEARCH RESULTS:
{raw_results}

INSTRUCTIONS:
1. Extract the most important facts, statistics, and trends.
2. Identify the key sources and URLs.
3. Structure the output as a Markdown report with sections:
   - Executive Summary
   - Key Findings (bullet points)
   - Detailed Analysis
   - Reliable Sources (list of URLs)
4. If the results are empty or irrelevant, say so and mark any general knowledge as "General Knowledge".

Return ONLY the Markdown report."#
    )
}

fn render_outline(outline: &Outline) -> String {
    let mut rendered = format!("Outline title: {}\n", outline.title);
    for (i, section) in outline.sections.iter().enumerate() {
        rendered.push_str(&format!("{}. {}\n", i + 1, section.heading));
        for point in &section.key_points {
            rendered.push_str(&format!("   - {point}\n"));
        }
    }
    rendered
}

/// Prompt for the article itself.
pub fn writing_prompt(brief: &WritingBrief<'_>, research_excerpt_chars: usize) -> String {
    let options = brief.options;
    let research = brief
        .research
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| excerpt(r, research_excerpt_chars))
        .unwrap_or(NO_RESEARCH);

    format!(
        r#"Write a {style} {content_type} about: {topic}

Requirements:
- Style: {style}
- Channel: {channel}
- Target length: {guide}
- Format: Start with a clear title on the first line, followed by the content
- Cover every outline section below, in order, using each section heading as a heading in the article

{outline}
Research summary:
{research}

Begin with the title on the first line, then the content."#,
        style = options.style,
        content_type = options.content_type,
        topic = brief.topic,
        channel = options.channel,
        guide = length_guide(&options.channel, &options.length),
        outline = render_outline(brief.outline),
    )
}
