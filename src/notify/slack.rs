//! Slack delivery via the Web API (`chat.postMessage`).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::{ResearchTopic, SlackConfig};
use crate::error::NotifyError;
use crate::notify::Notifier;
use crate::pipeline::types::{ClassifiedPaper, Paper};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Abstracts longer than this are cut in match messages.
const ABSTRACT_PREVIEW_CHARS: usize = 500;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SlackNotifier {
    client: reqwest::Client,
    api_base: String,
    token: SecretString,
    default_channel: String,
    channel_topics: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: SLACK_API_BASE.to_string(),
            token: config.api_token.clone(),
            default_channel: config.default_channel.clone(),
            channel_topics: config.channel_topics.clone(),
        })
    }

    /// Point the notifier at a different API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Post `text` to `channel`. Fails on transport errors and `ok: false`.
    pub async fn post(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "channel": channel,
            "text": text,
            "unfurl_links": true,
        });

        let resp = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Http(format!("HTTP {status}")));
        }

        let parsed: SlackResponse = resp
            .json()
            .await
            .map_err(|e| NotifyError::Http(format!("Unexpected Slack response: {e}")))?;
        if !parsed.ok {
            return Err(NotifyError::Slack {
                channel: channel.to_string(),
                error: parsed.error.unwrap_or_else(|| "unknown error".into()),
            });
        }
        Ok(())
    }

    fn channel_for<'a>(&'a self, topic: &'a ResearchTopic) -> &'a str {
        topic
            .slack_channel
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.default_channel)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify_matches(&self, results: &[ClassifiedPaper]) {
        for result in results {
            for topic in &result.topics {
                let channel = self.channel_for(topic);
                let text = match_message(&result.paper, topic);
                match self.post(channel, &text).await {
                    Ok(()) => tracing::info!(channel, topic = %topic.name, "Notification sent"),
                    Err(e) => tracing::error!(channel, topic = %topic.name, "Failed to send notification: {e}"),
                }
            }
        }
    }

    async fn send_digest(&self, papers_by_topic: &BTreeMap<String, Vec<Paper>>) {
        for (channel, topics) in &self.channel_topics {
            let text = digest_message(channel, topics, papers_by_topic);
            let target = channel_ref(channel);
            match self.post(&target, &text).await {
                Ok(()) => tracing::info!(channel = %target, "Digest sent"),
                Err(e) => tracing::error!(channel = %target, "Failed to send digest: {e}"),
            }
        }
    }
}

/// Per-match message: user mentions, then the paper's details.
pub fn match_message(paper: &Paper, topic: &ResearchTopic) -> String {
    format!(
        "{mentions}\nNew paper matching topic: {topic}\nTitle: {title}\nAuthors: {authors}\nVenue: {venue}\nURL: {url}\nAbstract: {abstract_text}",
        mentions = topic.slack_users.join(" "),
        topic = topic.name,
        title = paper.title,
        authors = paper.author_line(),
        venue = paper.venue,
        url = paper.url,
        abstract_text = preview(&paper.abstract_text),
    )
}

/// Digest for one channel, listing papers under each of its topics that
/// had matches.
pub fn digest_message(
    channel: &str,
    channel_topics: &[String],
    papers_by_topic: &BTreeMap<String, Vec<Paper>>,
) -> String {
    let name = channel.trim_start_matches('#');
    let sections: Vec<String> = papers_by_topic
        .iter()
        .filter(|(topic, papers)| !papers.is_empty() && channel_topics.contains(*topic))
        .map(|(topic, papers)| {
            let lines: Vec<String> = papers.iter().map(|p| format!("• {}", p.title)).collect();
            format!("*{topic}*:\n{}", lines.join("\n"))
        })
        .collect();

    if sections.is_empty() {
        format!("📚 *Weekly Scholar Scout Update*\nNo relevant papers were found for #{name} this week.")
    } else {
        format!(
            "📚 *Weekly Scholar Scout Update*\nHere are the relevant papers for #{name} this week:\n\n{}",
            sections.join("\n\n")
        )
    }
}

fn channel_ref(channel: &str) -> String {
    if channel.starts_with('#') {
        channel.to_string()
    } else {
        format!("#{channel}")
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= ABSTRACT_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(ABSTRACT_PREVIEW_CHARS).collect();
    format!("{cut}...")
}
