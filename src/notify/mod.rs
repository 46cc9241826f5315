//! Notification sinks for classification results.
//!
//! Sinks are fire-and-forget: delivery failures are logged inside the sink
//! and never reach the caller.

pub mod slack;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::pipeline::types::{ClassifiedPaper, Paper};

pub use slack::SlackNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message per (paper, matched topic) pair.
    async fn notify_matches(&self, results: &[ClassifiedPaper]);

    /// Deliver a digest of papers grouped by topic name.
    async fn send_digest(&self, papers_by_topic: &BTreeMap<String, Vec<Paper>>);
}
