//! Shared types for the classification pipeline.

use serde::{Deserialize, Serialize};

use crate::config::ResearchTopic;

/// Venue sentinel used when the model could not determine one.
pub const VENUE_NOT_FOUND: &str = "NOT-FOUND";

// ── Paper ───────────────────────────────────────────────────────────

/// One research paper extracted from an alert email.
///
/// At extraction time `authors` holds the raw author line as its single
/// element and `venue` is empty. After classification `authors` is the
/// model's structured list and `venue` the model's venue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    /// Direct paper link, never the redirect wrapper.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub venue: String,
}

impl Paper {
    /// Build a freshly extracted candidate from its author line.
    pub fn candidate(
        title: impl Into<String>,
        author_line: impl Into<String>,
        abstract_text: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            authors: vec![author_line.into()],
            abstract_text: abstract_text.into(),
            url: url.into(),
            venue: String::new(),
        }
    }

    /// Authors joined for display and prompting.
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }
}

// ── Classification result ───────────────────────────────────────────

/// A classified paper and the registry topics it matched, in registry order.
#[derive(Debug, Clone)]
pub struct ClassifiedPaper {
    pub paper: Paper,
    pub topics: Vec<ResearchTopic>,
}

impl ClassifiedPaper {
    pub fn topic_names(&self) -> Vec<&str> {
        self.topics.iter().map(|t| t.name.as_str()).collect()
    }
}
