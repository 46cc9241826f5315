//! Batch classification of alert emails.
//!
//! Flow per email:
//! 1. Pick the HTML body
//! 2. Extract candidate papers
//! 3. Drop duplicates and patents
//! 4. One completion call per survivor → repaired JSON → matched topics
//!
//! A failure on one paper is logged and skipped; the batch always completes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ClassifyError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mail::{MailMessage, html_body};
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::extract::extract_papers;
use crate::pipeline::prompt::build_classification_prompt;
use crate::pipeline::response::parse_classification;
use crate::pipeline::types::{ClassifiedPaper, Paper};
use crate::topics::TopicRegistry;

/// Classifies papers from alert emails against a topic registry.
///
/// Owns its dedup state: a paper seen by this instance is never classified
/// again by it. `&mut self` keeps batches strictly one at a time.
pub struct ScholarClassifier {
    llm: Arc<dyn LlmProvider>,
    registry: Arc<TopicRegistry>,
    dedup: Deduplicator,
}

impl ScholarClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, registry: Arc<TopicRegistry>) -> Self {
        Self {
            llm,
            registry,
            dedup: Deduplicator::new(),
        }
    }

    /// Classify every new paper in `messages`, in email then document order.
    pub async fn classify<M: MailMessage>(&mut self, messages: &[M]) -> Vec<ClassifiedPaper> {
        let mut results = Vec::new();

        for (index, message) in messages.iter().enumerate() {
            let candidates = self.extract_candidates(message);
            if candidates.is_empty() {
                debug!(email = index, "No new papers in email");
                continue;
            }

            for paper in &candidates {
                match self.classify_paper(paper).await {
                    Ok(classified) => {
                        info!(
                            title = %classified.paper.title,
                            topics = ?classified.topic_names(),
                            "Classified paper"
                        );
                        results.push(classified);
                    }
                    Err(e) => {
                        warn!(title = %paper.title, error = %e, "Skipping paper");
                    }
                }
            }
        }

        info!("Classified {} paper(s) from {} email(s)", results.len(), messages.len());
        results
    }

    /// HTML body → candidate papers → dedup filter. Records survivors as seen.
    pub fn extract_candidates<M: MailMessage + ?Sized>(&mut self, message: &M) -> Vec<Paper> {
        let html = html_body(message);
        if html.trim().is_empty() {
            debug!("Email has no HTML body");
            return Vec::new();
        }
        self.dedup.filter(extract_papers(&html))
    }

    /// Ask the model about one paper and merge its answer with the extracted
    /// record: title, abstract and url stay as extracted, authors and venue
    /// come from the model.
    pub async fn classify_paper(&self, paper: &Paper) -> Result<ClassifiedPaper, ClassifyError> {
        let prompt = build_classification_prompt(paper, &self.registry);
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);
        let response = self.llm.complete(request).await?;

        debug!(title = %paper.title, raw = %response.content, "Classification reply");

        let classification = parse_classification(&response.content).inspect_err(|e| {
            warn!(
                title = %paper.title,
                raw = %response.content,
                error = %e,
                "Unusable classification reply"
            );
        })?;

        let authors = if classification.authors.is_empty() {
            paper.authors.clone()
        } else {
            classification.authors.clone()
        };
        let topics = self.registry.match_names(classification.topic_names());

        Ok(ClassifiedPaper {
            paper: Paper {
                title: paper.title.clone(),
                authors,
                abstract_text: paper.abstract_text.clone(),
                url: paper.url.clone(),
                venue: classification.venue_or_default(),
            },
            topics,
        })
    }
}

/// Group classified papers by topic name. Papers keep result order.
pub fn papers_by_topic(results: &[ClassifiedPaper]) -> BTreeMap<String, Vec<Paper>> {
    let mut grouped: BTreeMap<String, Vec<Paper>> = BTreeMap::new();
    for result in results {
        for topic in &result.topics {
            grouped
                .entry(topic.name.clone())
                .or_default()
                .push(result.paper.clone());
        }
    }
    grouped
}
