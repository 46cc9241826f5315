use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use scholar_scout::app::{self, RunOptions};
use scholar_scout::config::{AppConfig, DEFAULT_CONFIG_PATH};

/// Classify Google Scholar alert emails by research topic and post matches to Slack.
#[derive(Debug, Parser)]
#[command(name = "scholar-scout", version)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(short, long, env = "SCHOLAR_SCOUT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Verbose logging; matches are logged instead of sent to Slack.
    #[arg(long)]
    debug: bool,

    /// Delete alert emails older than `email_cleanup.time_window` after the run.
    #[arg(long)]
    delete_old: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    eprintln!("📚 Scholar Scout v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Config: {}", cli.config.display());
    eprintln!("   Model: {}", config.perplexity.model);
    eprintln!("   Mailbox: {}@{}/{}", config.email.username, config.email.imap_host, config.email.folder);
    eprintln!("   Topics: {}", config.research_topics.len());

    let options = RunOptions {
        notify: !cli.debug,
        delete_old: cli.delete_old,
    };
    let summary = app::run(&config, options).await.context("Scholar Scout run failed")?;

    tracing::info!(
        emails = summary.emails,
        classified = summary.classified,
        matched = summary.matched,
        deleted = summary.deleted,
        "Run complete"
    );
    Ok(())
}
