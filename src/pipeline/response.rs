//! Repair and parse the model's classification reply.
//!
//! Models wrap JSON in code fences, annotate it with `//` comments and leave
//! trailing commas. Each fix-up is a separate pure stage:
//! fence strip → comment strip → trailing-comma strip → parse.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ClassifyError;
use crate::pipeline::types::VENUE_NOT_FOUND;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex is valid"));

/// The model's structured answer for one paper.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Classification {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "author_list")]
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default, deserialize_with = "lenient_string")]
    pub abstract_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub link: Option<String>,
    #[serde(default)]
    pub relevant_topics: Value,
}

impl Classification {
    /// String entries of `relevant_topics`; anything else is ignored.
    pub fn topic_names(&self) -> Vec<&str> {
        match &self.relevant_topics {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            Value::String(single) => vec![single.as_str()],
            _ => Vec::new(),
        }
    }

    /// The model's venue, or `NOT-FOUND` when it gave none.
    pub fn venue_or_default(&self) -> String {
        match self.venue.as_deref().map(str::trim) {
            Some(venue) if !venue.is_empty() => venue.to_string(),
            _ => VENUE_NOT_FOUND.to_string(),
        }
    }
}

/// Parse a raw completion into a `Classification`.
pub fn parse_classification(raw: &str) -> Result<Classification, ClassifyError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ClassifyError::EmptyResponse);
    }

    let cleaned = strip_trailing_commas(&strip_line_comments(strip_code_fence(raw)));
    if cleaned.trim().is_empty() {
        return Err(ClassifyError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(&cleaned).map_err(|e| ClassifyError::MalformedJson {
        reason: e.to_string(),
    })?;

    let object = match value {
        Value::Array(items) => items.into_iter().next().ok_or(ClassifyError::EmptyArray)?,
        other => other,
    };
    if !object.is_object() {
        return Err(ClassifyError::InvalidObject {
            reason: format!("expected a JSON object, got {}", json_kind(&object)),
        });
    }

    serde_json::from_value(object).map_err(|e| ClassifyError::InvalidObject {
        reason: e.to_string(),
    })
}

/// Inner content of a ```` ```json ```` block, else of the first fenced
/// block, else the text unchanged. An unclosed fence runs to the end.
pub fn strip_code_fence(text: &str) -> &str {
    let inner = |open: usize, marker: &str| {
        let rest = &text[open + marker.len()..];
        rest.find("```").map_or(rest, |close| &rest[..close]).trim()
    };

    if let Some(open) = text.find("```json") {
        inner(open, "```json")
    } else if let Some(open) = text.find("```") {
        inner(open, "```")
    } else {
        text
    }
}

/// Drop `//` comments outside string literals, then drop lines left empty.
///
/// String state carries across lines; a backslash escapes the next character.
pub fn strip_line_comments(text: &str) -> String {
    let mut in_string = false;
    let mut kept = Vec::new();

    for line in text.lines() {
        let mut escaped = false;
        let mut cut = line.len();
        let mut chars = line.char_indices().peekable();

        while let Some((index, c)) = chars.next() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
            } else if c == '"' {
                in_string = true;
            } else if c == '/' && chars.peek().is_some_and(|&(_, next)| next == '/') {
                cut = index;
                break;
            }
        }

        let line = line[..cut].trim_end();
        if !line.trim().is_empty() {
            kept.push(line);
        }
    }

    kept.join("\n")
}

/// Remove commas directly before a closing `}` or `]`.
pub fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Accepts a list of names or a single author line.
fn author_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect()),
        Value::String(line) if line.trim().is_empty() => Ok(Vec::new()),
        Value::String(line) => Ok(vec![line.trim().to_string()]),
        other => Err(serde::de::Error::custom(format!(
            "authors must be a list of strings, got {}",
            json_kind(&other)
        ))),
    }
}
