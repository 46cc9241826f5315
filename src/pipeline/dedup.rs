//! Cross-email duplicate and patent filtering.

use std::collections::HashSet;

use crate::pipeline::types::Paper;

/// Lowercased title fragments that mark patent filings.
const EXCLUDED_TERMS: &[&str] = &["patent", "apparatus", "method and system"];

/// Remembers every paper it has let through for the lifetime of the instance.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_titles: HashSet<String>,
    seen_urls: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep papers whose title and URL have not been seen and whose title
    /// is not a patent. Survivors are recorded as seen.
    pub fn filter(&mut self, papers: Vec<Paper>) -> Vec<Paper> {
        let total = papers.len();
        let mut kept = Vec::with_capacity(total);

        for paper in papers {
            let title = normalize(&paper.title);
            let url = normalize(&paper.url);

            if self.seen_titles.contains(&title) || (!url.is_empty() && self.seen_urls.contains(&url)) {
                tracing::info!(title = %paper.title, "Skipping duplicate paper");
                continue;
            }
            if EXCLUDED_TERMS.iter().any(|term| title.contains(term)) {
                tracing::info!(title = %paper.title, "Skipping patent");
                continue;
            }

            self.seen_titles.insert(title);
            if !url.is_empty() {
                self.seen_urls.insert(url);
            }
            kept.push(paper);
        }

        tracing::info!(
            "Found {} papers, {} after filtering duplicates and patents",
            total,
            kept.len()
        );
        kept
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}
