//! Structured article outline and its validation rules.
//!
//! An [`Outline`] stored in a run record is always fully valid: a non-empty
//! title, at least one section, every section with a non-empty heading and at
//! least one non-empty key point, and headings unique ignoring case.
//! [`Outline::parse`] is the single entry point for model output; it either
//! returns a valid outline or the first rule that was violated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Topic;

/// Placeholder key point used by [`Outline::fallback`].
const FALLBACK_KEY_POINT_PREFIX: &str = "Overview of";

/// A section of an [`Outline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section heading, unique within the outline ignoring case.
    pub heading: String,
    /// Points the section must cover, in order.
    pub key_points: Vec<String>,
}

/// The structured plan the Writer follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    /// Proposed article title.
    pub title: String,
    /// Sections in article order.
    pub sections: Vec<Section>,
}

/// Reasons model output could not be accepted as an [`Outline`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutlineValidationError {
    /// The output was not JSON matching the outline shape.
    #[error("output is not valid outline JSON: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    #[error("outline title is empty")]
    EmptyTitle,

    #[error("outline has no sections")]
    NoSections,

    /// Section at `index` (zero-based) has a blank heading.
    #[error("section {index} has an empty heading")]
    EmptyHeading { index: usize },

    #[error("section '{heading}' has no key points")]
    NoKeyPoints { heading: String },

    #[error("section '{heading}' has an empty key point")]
    EmptyKeyPoint { heading: String },

    #[error("duplicate section heading '{heading}' (headings must be unique, ignoring case)")]
    DuplicateHeading { heading: String },
}

impl Outline {
    /// Parses and validates raw model output.
    ///
    /// Markdown code fences around the JSON are tolerated. A response that is
    /// well-formed JSON but violates a rule (e.g. zero sections) is reported as
    /// a validation error rather than a parse error.
    pub fn parse(raw: &str) -> Result<Self, OutlineValidationError> {
        let json = strip_code_fences(raw);
        let outline: Outline =
            serde_json::from_str(json).map_err(|e| OutlineValidationError::Parse {
                message: e.to_string(),
            })?;
        outline.validate()?;
        Ok(outline)
    }

    /// Checks every outline rule, returning the first violation.
    pub fn validate(&self) -> Result<(), OutlineValidationError> {
        if self.title.trim().is_empty() {
            return Err(OutlineValidationError::EmptyTitle);
        }
        if self.sections.is_empty() {
            return Err(OutlineValidationError::NoSections);
        }

        let mut seen = HashSet::new();
        for (index, section) in self.sections.iter().enumerate() {
            let heading = section.heading.trim();
            if heading.is_empty() {
                return Err(OutlineValidationError::EmptyHeading { index });
            }
            if section.key_points.is_empty() {
                return Err(OutlineValidationError::NoKeyPoints {
                    heading: heading.to_string(),
                });
            }
            if section.key_points.iter().any(|p| p.trim().is_empty()) {
                return Err(OutlineValidationError::EmptyKeyPoint {
                    heading: heading.to_string(),
                });
            }
            if !seen.insert(heading.to_lowercase()) {
                return Err(OutlineValidationError::DuplicateHeading {
                    heading: heading.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The deterministic outline substituted when generation never produced a
    /// valid one: the topic as title, one section headed by the topic with a
    /// single placeholder key point.
    pub fn fallback(topic: &Topic) -> Self {
        Self {
            title: topic.to_string(),
            sections: vec![Section {
                heading: topic.to_string(),
                key_points: vec![format!("{FALLBACK_KEY_POINT_PREFIX} {topic}")],
            }],
        }
    }

    /// Section headings in outline order.
    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.heading.as_str())
    }
}

/// Returns the content of the first fenced code block, or the trimmed input
/// when there is none.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let start = start + "```json".len();
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip a language identifier on the fence line.
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "title": "Python Tips",
        "sections": [
            {"heading": "Getting Started", "key_points": ["Install Python"]},
            {"heading": "Idioms", "key_points": ["List comprehensions", "f-strings"]}
        ]
    }"#;

    #[test]
    fn test_parse_valid_outline() {
        let outline = Outline::parse(VALID).unwrap();
        assert_eq!(outline.title, "Python Tips");
        assert_eq!(
            outline.headings().collect::<Vec<_>>(),
            vec!["Getting Started", "Idioms"]
        );
    }

    #[test]
    fn test_parse_fenced_outline() {
        let fenced = format!("Here you go:\n```json\n{VALID}\n```\nEnjoy");
        assert!(Outline::parse(&fenced).is_ok());

        let plain = format!("```\n{VALID}\n```");
        assert!(Outline::parse(&plain).is_ok());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = Outline::parse("{\"title\": ").unwrap_err();
        assert!(matches!(err, OutlineValidationError::Parse { .. }));
    }

    #[test]
    fn test_zero_sections_is_validation_error() {
        let err = Outline::parse(r#"{"title": "T", "sections": []}"#).unwrap_err();
        assert_eq!(err, OutlineValidationError::NoSections);
    }

    #[test]
    fn test_empty_title_rejected() {
        let err = Outline::parse(
            r#"{"title": "  ", "sections": [{"heading": "A", "key_points": ["x"]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err, OutlineValidationError::EmptyTitle);
    }

    #[test]
    fn test_section_rules() {
        let empty_heading =
            r#"{"title": "T", "sections": [{"heading": "", "key_points": ["x"]}]}"#;
        assert_eq!(
            Outline::parse(empty_heading).unwrap_err(),
            OutlineValidationError::EmptyHeading { index: 0 }
        );

        let no_points = r#"{"title": "T", "sections": [{"heading": "A", "key_points": []}]}"#;
        assert_eq!(
            Outline::parse(no_points).unwrap_err(),
            OutlineValidationError::NoKeyPoints {
                heading: "A".into()
            }
        );

        let blank_point =
            r#"{"title": "T", "sections": [{"heading": "A", "key_points": ["x", " "]}]}"#;
        assert_eq!(
            Outline::parse(blank_point).unwrap_err(),
            OutlineValidationError::EmptyKeyPoint {
                heading: "A".into()
            }
        );
    }

    #[test]
    fn test_duplicate_headings_ignore_case() {
        let dup = r#"{"title": "T", "sections": [
            {"heading": "Basics", "key_points": ["x"]},
            {"heading": "BASICS", "key_points": ["y"]}
        ]}"#;
        assert_eq!(
            Outline::parse(dup).unwrap_err(),
            OutlineValidationError::DuplicateHeading {
                heading: "BASICS".into()
            }
        );
    }

    #[test]
    fn test_fallback_outline_is_valid_single_section() {
        let topic = Topic::new("Python tips").unwrap();
        let outline = Outline::fallback(&topic);
        assert!(outline.validate().is_ok());
        assert_eq!(outline.title, "Python tips");
        assert_eq!(outline.sections.len(), 1);
        assert_eq!(outline.sections[0].heading, "Python tips");
        assert_eq!(outline.sections[0].key_points, vec!["Overview of Python tips"]);
    }
}
