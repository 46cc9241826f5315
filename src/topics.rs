//! Topic registry and model-output topic matching.

use std::collections::HashSet;

use crate::config::ResearchTopic;
use crate::error::ConfigError;

/// The fixed, validated set of research topics. Read-only after construction.
#[derive(Debug, Clone)]
pub struct TopicRegistry {
    topics: Vec<ResearchTopic>,
}

impl TopicRegistry {
    /// Build a registry, rejecting unnamed topics and case-insensitive duplicates.
    pub fn new(topics: Vec<ResearchTopic>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for (index, topic) in topics.iter().enumerate() {
            let key = topic.name.trim().to_lowercase();
            if key.is_empty() {
                return Err(ConfigError::MissingRequired {
                    key: format!("research_topics[{index}].name"),
                    hint: "Every topic needs a name".into(),
                });
            }
            if !seen.insert(key) {
                return Err(ConfigError::DuplicateTopic(topic.name.clone()));
            }
        }
        Ok(Self { topics })
    }

    pub fn topics(&self) -> &[ResearchTopic] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Resolve model-provided topic strings to registry topics.
    ///
    /// Exact, case-insensitive name match only. Unknown names are ignored and
    /// the result follows registry order, so duplicates collapse naturally.
    pub fn match_names<I, S>(&self, names: I) -> Vec<ResearchTopic>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: HashSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();

        self.topics
            .iter()
            .filter(|t| wanted.contains(&t.name.trim().to_lowercase()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[&str]) -> TopicRegistry {
        TopicRegistry::new(
            names
                .iter()
                .map(|n| ResearchTopic::new(*n, format!("{n} research")))
                .collect(),
        )
        .unwrap()
    }

    fn names(topics: &[ResearchTopic]) -> Vec<&str> {
        topics.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn match_follows_registry_order_and_ignores_unknown() {
        let reg = registry(&["A", "B", "C"]);
        let matched = reg.match_names(["b", "A", "Z"]);
        assert_eq!(names(&matched), vec!["A", "B"]);
    }

    #[test]
    fn match_collapses_duplicates() {
        let reg = registry(&["LLM Inference", "Serverless Computing"]);
        let matched = reg.match_names(["llm inference", "LLM INFERENCE", " LLM Inference "]);
        assert_eq!(names(&matched), vec!["LLM Inference"]);
    }

    #[test]
    fn match_is_exact_not_substring() {
        let reg = registry(&["LLM Inference"]);
        assert!(reg.match_names(["LLM"]).is_empty());
        assert!(reg.match_names(["LLM Inference systems"]).is_empty());
        assert!(reg.match_names(["LLM Inference: LLM Inference research"]).is_empty());
    }

    #[test]
    fn match_empty_input() {
        let reg = registry(&["A"]);
        assert!(reg.match_names(Vec::<String>::new()).is_empty());
        assert!(reg.match_names([""]).is_empty());
    }

    #[test]
    fn unicode_names_match_case_insensitively() {
        let reg = registry(&["Ünicode Systems"]);
        assert_eq!(names(&reg.match_names(["ünicode systems"])), vec!["Ünicode Systems"]);
        assert_eq!(reg.match_names(["ÜNICODE SYSTEMS"]).len(), 1);
    }

    #[test]
    fn registry_rejects_unnamed_topic() {
        let result = TopicRegistry::new(vec![ResearchTopic::new("A", ""), ResearchTopic::new("  ", "")]);
        match result {
            Err(ConfigError::MissingRequired { key, .. }) => {
                assert_eq!(key, "research_topics[1].name");
            }
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let result = TopicRegistry::new(vec![ResearchTopic::new("A", ""), ResearchTopic::new("a", "")]);
        assert!(matches!(result, Err(ConfigError::DuplicateTopic(_))));
    }
}
