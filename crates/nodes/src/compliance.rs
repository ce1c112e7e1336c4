//! Checks that written text addresses every outline heading.
//!
//! A heading counts as addressed when its normalized form appears in the
//! normalized text, or when at least [`WORD_MATCH_THRESHOLD`] of its
//! significant words occur in the text. Normalization lowercases and replaces
//! punctuation with spaces, so Markdown heading markers and numbering do not
//! matter.

use std::collections::HashSet;

use pipeline::{ComplianceReport, Outline};

/// Fraction of a heading's significant words that must appear in the text.
pub const WORD_MATCH_THRESHOLD: f64 = 0.6;

const MIN_WORD_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "and", "are", "but", "can", "for", "from", "has", "have", "how", "into", "its", "not", "of",
    "off", "our", "out", "than", "that", "the", "their", "then", "these", "this", "those", "through",
    "to", "was", "were", "what", "when", "where", "which", "who", "why", "will", "with", "you",
    "your",
];

fn normalize(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips a simple plural `s` so "tips" matches "tip".
fn stem(word: &str) -> &str {
    if word.len() > MIN_WORD_LEN && word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else {
        word
    }
}

fn significant_words(normalized: &str) -> Vec<&str> {
    normalized
        .split(' ')
        .filter(|w| w.chars().count() >= MIN_WORD_LEN && !STOP_WORDS.contains(w))
        .map(stem)
        .collect()
}

fn addresses(normalized_text: &str, text_words: &HashSet<&str>, heading: &str) -> bool {
    let heading = normalize(heading);
    if heading.is_empty() {
        return true;
    }
    if format!(" {normalized_text} ").contains(&format!(" {heading} ")) {
        return true;
    }

    let words = significant_words(&heading);
    if words.is_empty() {
        return false;
    }
    let matched = words.iter().filter(|w| text_words.contains(*w)).count();
    matched as f64 / words.len() as f64 >= WORD_MATCH_THRESHOLD
}

/// Returns the outline headings, in order, that `text` does not address.
pub fn check(outline: &Outline, text: &str) -> ComplianceReport {
    let normalized = normalize(text);
    let text_words: HashSet<&str> = normalized.split(' ').map(stem).collect();

    let missing_headings = outline
        .headings()
        .filter(|heading| !addresses(&normalized, &text_words, heading))
        .map(str::to_string)
        .collect();
    ComplianceReport { missing_headings }
}
