//! Alert-email classification pipeline.
//!
//! Every alert email flows through:
//! 1. `extract::extract_papers()`: HTML entries → candidate papers
//! 2. `dedup::Deduplicator::filter()`: drop repeats and patents
//! 3. `prompt::build_classification_prompt()` + one completion call
//! 4. `response::parse_classification()`: repair and parse the reply
//! 5. `TopicRegistry::match_names()`: reply topics → registry topics
//!
//! `classifier::ScholarClassifier` drives the stages over a batch.

pub mod classifier;
pub mod dedup;
pub mod extract;
pub mod prompt;
pub mod response;
pub mod types;

pub use classifier::{ScholarClassifier, papers_by_topic};
pub use types::{ClassifiedPaper, Paper};
