//! LLM integration for Scholar Scout.
//!
//! Perplexity speaks the OpenAI chat-completions wire format, so it goes
//! through `OpenAiCompatProvider`, exposed as `Arc<dyn LlmProvider>`.

pub mod openai;
pub mod provider;

pub use openai::OpenAiCompatProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use crate::config::PerplexityConfig;
use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Perplexity,
}

impl LlmBackend {
    fn label(self) -> &'static str {
        match self {
            Self::Perplexity => "perplexity",
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn from_perplexity(config: &PerplexityConfig) -> Self {
        Self {
            backend: LlmBackend::Perplexity,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiCompatProvider::new(
        config.backend.label(),
        config.base_url.clone(),
        config.api_key.clone(),
        config.model.clone(),
        config.timeout,
    )?;
    tracing::info!(
        "Using {} (model: {}, base: {})",
        config.backend.label(),
        config.model,
        config.base_url
    );
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_missing_key_still_constructs() {
        // Auth is only checked when a request is made.
        let config = LlmConfig {
            backend: LlmBackend::Perplexity,
            api_key: secrecy::SecretString::from("test-key"),
            model: "sonar-pro".to_string(),
            base_url: "https://api.perplexity.ai".to_string(),
            timeout: Duration::from_secs(10),
        };
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().model_name(), "sonar-pro");
    }

    #[test]
    fn test_from_perplexity_config() {
        let config = LlmConfig::from_perplexity(&PerplexityConfig {
            api_key: secrecy::SecretString::from("pplx-test"),
            model: "sonar".to_string(),
            base_url: "https://api.perplexity.ai".to_string(),
            timeout_secs: 15,
        });
        assert_eq!(config.backend, LlmBackend::Perplexity);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(create_provider(&config).unwrap().model_name(), "sonar");
    }
}
