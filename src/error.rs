//! Error types for Scholar Scout.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),
}

/// Configuration-related errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Duplicate research topic name: {0}")]
    DuplicateTopic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Completion-provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Mail transport errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("IMAP connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IMAP login failed for {username}")]
    LoginFailed { username: String },

    #[error("IMAP command {command} failed: {response}")]
    Command { command: String, response: String },

    #[error("IMAP connection closed by server")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mail task failed: {0}")]
    Task(String),
}

/// Notification-sink errors. Sinks log these; they never reach the classifier.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Slack API error on {channel}: {error}")]
    Slack { channel: String, error: String },
}

/// Per-paper classification errors. Logged and skipped, never fatal to a batch.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Completion failed: {0}")]
    Completion(#[from] LlmError),

    #[error("Empty completion content")]
    EmptyResponse,

    #[error("Malformed classification JSON: {reason}")]
    MalformedJson { reason: String },

    #[error("Classification array was empty")]
    EmptyArray,

    #[error("Classification object invalid: {reason}")]
    InvalidObject { reason: String },
}

/// Result type alias for Scholar Scout.
pub type Result<T> = std::result::Result<T, Error>;
