//! One end-to-end run: fetch alerts, classify, notify, clean up.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::llm::{LlmConfig, create_provider};
use crate::mail::{ImapMailbox, MailMessage};
use crate::notify::{Notifier, SlackNotifier};
use crate::pipeline::{ScholarClassifier, papers_by_topic};
use crate::topics::TopicRegistry;

/// What a run is allowed to do besides classifying.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Post matches and digests to Slack. Off in debug runs.
    pub notify: bool,
    /// Delete alerts older than `email_cleanup.time_window` afterwards.
    pub delete_old: bool,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub emails: usize,
    pub classified: usize,
    pub matched: usize,
    pub deleted: usize,
}

/// Run the whole pipeline once against the configured mailbox.
pub async fn run(config: &AppConfig, options: RunOptions) -> crate::Result<RunSummary> {
    let registry = Arc::new(TopicRegistry::new(config.research_topics.clone())?);
    info!("Loaded {} research topic(s)", registry.len());

    let llm = create_provider(&LlmConfig::from_perplexity(&config.perplexity))?;
    let notifier: Option<Box<dyn Notifier>> = if options.notify {
        Some(Box::new(SlackNotifier::new(&config.slack)?))
    } else {
        info!("Notifications disabled for this run");
        None
    };

    let mailbox = ImapMailbox::new(config.email.clone(), config.email_filter.clone());
    let emails = mailbox.fetch_alerts().await?;

    let mut classifier = ScholarClassifier::new(llm, registry);
    let mut summary = process_batch(&mut classifier, &emails, notifier.as_deref()).await;

    if options.delete_old {
        match &config.email_cleanup {
            Some(cleanup) => summary.deleted = mailbox.delete_older_than(cleanup.time_window).await?,
            None => warn!("--delete-old given but email_cleanup.time_window is not configured"),
        }
    }

    Ok(summary)
}

/// Classify `emails` and hand the results to `notifier`. Without a notifier
/// matches are only logged.
pub async fn process_batch<M: MailMessage>(
    classifier: &mut ScholarClassifier,
    emails: &[M],
    notifier: Option<&dyn Notifier>,
) -> RunSummary {
    let results = classifier.classify(emails).await;
    let matched: Vec<_> = results.iter().filter(|r| !r.topics.is_empty()).cloned().collect();

    match notifier {
        Some(notifier) => {
            notifier.notify_matches(&matched).await;
            notifier.send_digest(&papers_by_topic(&matched)).await;
        }
        None => {
            for result in &matched {
                info!(
                    title = %result.paper.title,
                    venue = %result.paper.venue,
                    topics = ?result.topic_names(),
                    "Match"
                );
            }
        }
    }

    RunSummary {
        emails: emails.len(),
        classified: results.len(),
        matched: matched.len(),
        deleted: 0,
    }
}
