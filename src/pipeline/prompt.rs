//! Classification prompt rendering.

use std::fmt::Write;

use crate::pipeline::types::{Paper, VENUE_NOT_FOUND};
use crate::topics::TopicRegistry;

/// Render the single-turn prompt asking the model to extract metadata for
/// `paper` and pick matching topics from `registry`.
///
/// Pure and deterministic: the same inputs always give the same string.
pub fn build_classification_prompt(paper: &Paper, registry: &TopicRegistry) -> String {
    let mut topics = String::new();
    for topic in registry.topics() {
        let _ = writeln!(topics, "- {}: {}", topic.name, topic.description);
    }

    format!(
        r#"Below is a paper from a Google Scholar alert. Extract its metadata and classify it.

Title: {title}
Authors: {authors}
Abstract: {abstract_text}

Research topics (name: description):
{topics}
Return a SINGLE JSON object with ALL of these required fields:
{{
  "title": "the paper title",
  "authors": ["each", "author", "separately"],
  "abstract": "the paper abstract",
  "venue": "the publication venue",
  "link": "the paper URL",
  "relevant_topics": ["names from the topic list"]
}}

Venue rules:
- "arXiv preprint" if the author line contains "arXiv"
- "Patent Application" if the author line contains "Patent"
- otherwise the text between the dash and the year for published papers
- "{not_found}" if none of the above applies

Rules:
1. Return exactly ONE JSON object, never an array of objects.
2. All fields (title, authors, abstract, venue, link, relevant_topics) are required.
3. relevant_topics may ONLY contain topic names from the list above, spelled exactly. Do not invent topics.
4. Leave relevant_topics as an empty list if no topic matches.
5. For LLM/VLM relevance, lean toward inclusion:
   - include any paper that uses or studies language or vision-language models
   - include LLM/VLM applications, systems and benchmarks
   - include model serving, deployment and optimization work
   - when in doubt about LLM/VLM relevance, include it
6. Do not put comments or any text outside the JSON object.
"#,
        title = paper.title,
        authors = paper.author_line(),
        abstract_text = paper.abstract_text,
        topics = topics,
        not_found = VENUE_NOT_FOUND,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchTopic;

    fn registry() -> TopicRegistry {
        TopicRegistry::new(vec![
            ResearchTopic::new("LLM Inference", "Serving and optimizing large language models"),
            ResearchTopic::new("Serverless Computing", "Function-as-a-service platforms"),
        ])
        .unwrap()
    }

    fn paper() -> Paper {
        Paper::candidate(
            "Efficient X on Serverless Platforms",
            "John Doe, Jane Smith - arXiv preprint arXiv:2401.00001, 2024",
            "We study serverless inference.",
            "https://arxiv.org/abs/2401.00001",
        )
    }

    #[test]
    fn prompt_lists_every_topic() {
        let prompt = build_classification_prompt(&paper(), &registry());
        assert!(prompt.contains("- LLM Inference: Serving and optimizing large language models\n"));
        assert!(prompt.contains("- Serverless Computing: Function-as-a-service platforms\n"));
    }

    #[test]
    fn prompt_embeds_paper_fields() {
        let prompt = build_classification_prompt(&paper(), &registry());
        assert!(prompt.contains("Title: Efficient X on Serverless Platforms\n"));
        assert!(prompt.contains("Authors: John Doe, Jane Smith - arXiv preprint"));
        assert!(prompt.contains("Abstract: We study serverless inference.\n"));
    }

    #[test]
    fn prompt_names_required_fields_and_rules() {
        let prompt = build_classification_prompt(&paper(), &registry());
        for field in ["\"title\"", "\"authors\"", "\"abstract\"", "\"venue\"", "\"link\"", "\"relevant_topics\""] {
            assert!(prompt.contains(field), "missing {field}");
        }
        assert!(prompt.contains("never an array"));
        assert!(prompt.contains("\"arXiv preprint\""));
        assert!(prompt.contains("\"Patent Application\""));
        assert!(prompt.contains("\"NOT-FOUND\""));
        assert!(prompt.contains("Do not invent topics"));
        assert!(prompt.contains("when in doubt about LLM/VLM relevance, include it"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let reg = registry();
        assert_eq!(
            build_classification_prompt(&paper(), &reg),
            build_classification_prompt(&paper(), &reg)
        );
    }
}
