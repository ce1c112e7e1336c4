//! Shared value types for the pipeline domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! payloads that flow between stages: search results, generation requests and
//! the finished article.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// A single cited source returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Page or result title. Falls back to the URL host when the provider
    /// returns no title.
    pub title: String,
    /// Absolute URL of the source.
    pub url: String,
}

impl Source {
    /// Creates a [`Source`].
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

// ---------------------------------------------------------------------------

/// The raw payload of one successful search call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResults {
    /// Free-text research material.
    pub text: String,
    /// Sources in provider order.
    pub sources: Vec<Source>,
}

impl SearchResults {
    /// Returns `true` if the provider returned no usable text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// One call to the text generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The complete prompt.
    pub prompt: String,
    /// Sampling temperature; `None` leaves the provider default.
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Creates a request with the provider's default temperature.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// The written article produced by the Write stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Article title.
    pub title: String,
    /// Article body.
    pub text: String,
    /// Whitespace-delimited token count of `text`.
    pub word_count: usize,
}

impl Article {
    /// Creates an [`Article`], computing the word count from `text`.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = count_words(&text);
        Self {
            title: title.into(),
            text,
            word_count,
        }
    }
}

/// Counts whitespace-delimited tokens.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
