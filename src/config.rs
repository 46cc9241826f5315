//! Configuration types and YAML loading.
//!
//! The config file is a YAML template: `$VAR` and `${VAR}` are replaced with
//! environment values before parsing, unknown variables are left verbatim and
//! `$$` produces a literal `$`.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Local, NaiveDate, TimeDelta};
use regex::{Captures, Regex};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yml";

/// Sender of Google Scholar alert emails.
const DEFAULT_ALERT_SENDER: &str = "scholaralerts-noreply@google.com";

/// Longest accepted time window, in days.
const MAX_WINDOW_DAYS: i64 = 36_500;

static TEMPLATE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([A-Za-z_][A-Za-z0-9_]*)|\{([A-Za-z_][A-Za-z0-9_]*)\})")
        .expect("template variable regex is valid")
});

// ── Sections ────────────────────────────────────────────────────────

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub email: EmailConfig,
    pub slack: SlackConfig,
    pub perplexity: PerplexityConfig,
    pub research_topics: Vec<ResearchTopic>,
    #[serde(default)]
    pub email_filter: EmailFilter,
    #[serde(default)]
    pub email_cleanup: Option<EmailCleanup>,
}

/// IMAP account settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub username: String,
    #[serde(deserialize_with = "secret_string")]
    pub password: SecretString,
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_imap_host")]
    pub imap_host: String,
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
}

/// Slack notifier settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    #[serde(deserialize_with = "secret_string")]
    pub api_token: SecretString,
    pub default_channel: String,
    /// Digest routing: channel name → topic names posted to it.
    #[serde(default)]
    pub channel_topics: BTreeMap<String, Vec<String>>,
}

/// Completion service settings (Perplexity's OpenAI-compatible API).
#[derive(Debug, Clone, Deserialize)]
pub struct PerplexityConfig {
    #[serde(deserialize_with = "secret_string")]
    pub api_key: SecretString,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// A research topic papers are classified against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResearchTopic {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Informational only; matching is model-driven.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub slack_channel: Option<String>,
    #[serde(default)]
    pub slack_users: Vec<String>,
}

impl ResearchTopic {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: Vec::new(),
            slack_channel: None,
            slack_users: Vec::new(),
        }
    }
}

/// Which inbox messages count as alert emails.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailFilter {
    #[serde(default = "default_alert_sender")]
    pub from: String,
    /// Accept a message if its subject contains any of these. Empty accepts all.
    #[serde(default)]
    pub subject: Vec<String>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self {
            from: default_alert_sender(),
            subject: Vec::new(),
            time_window: None,
        }
    }
}

impl EmailFilter {
    /// Whether a decoded subject line passes the subject filter.
    pub fn accepts_subject(&self, subject: &str) -> bool {
        self.subject.is_empty() || self.subject.iter().any(|s| subject.contains(s.as_str()))
    }
}

/// Old-alert cleanup settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailCleanup {
    pub time_window: TimeWindow,
}

fn default_folder() -> String {
    "INBOX".to_string()
}

fn default_imap_host() -> String {
    "imap.gmail.com".to_string()
}

fn default_imap_port() -> u16 {
    993
}

fn default_model() -> String {
    "sonar-pro".to_string()
}

fn default_base_url() -> String {
    "https://api.perplexity.ai".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_alert_sender() -> String {
    DEFAULT_ALERT_SENDER.to_string()
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

// ── Time windows ────────────────────────────────────────────────────

/// A relative window such as `7D`, `2W` or `1M` (a month is 30 days).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct TimeWindow {
    amount: u32,
    unit: WindowUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowUnit {
    Days,
    Weeks,
    Months,
}

impl TimeWindow {
    pub fn duration(&self) -> TimeDelta {
        TimeDelta::days(self.days())
    }

    fn days(&self) -> i64 {
        let amount = i64::from(self.amount);
        match self.unit {
            WindowUnit::Days => amount,
            WindowUnit::Weeks => amount * 7,
            WindowUnit::Months => amount * 30,
        }
    }

    /// The calendar date this window reaches back to from `today`.
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        today - self.duration()
    }

    /// Start date relative to the local clock.
    pub fn start_date_from_now(&self) -> NaiveDate {
        self.start_date(Local::now().date_naive())
    }
}

impl FromStr for TimeWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |message: &str| ConfigError::InvalidValue {
            key: "time_window".into(),
            message: format!("'{s}': {message}"),
        };

        let unit_char = s.chars().last().ok_or_else(|| invalid("empty window"))?;
        let unit = match unit_char.to_ascii_uppercase() {
            'D' => WindowUnit::Days,
            'W' => WindowUnit::Weeks,
            'M' => WindowUnit::Months,
            _ => return Err(invalid("unit must be D, W or M")),
        };
        let amount = s[..s.len() - unit_char.len_utf8()]
            .parse::<u32>()
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| invalid("amount must be a positive integer"))?;

        let window = Self { amount, unit };
        if window.days() > MAX_WINDOW_DAYS {
            return Err(invalid(&format!("window exceeds {MAX_WINDOW_DAYS} days")));
        }
        Ok(window)
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ── Loading ─────────────────────────────────────────────────────────

impl AppConfig {
    /// Load, substitute environment variables into, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.display().to_string()),
            _ => ConfigError::Io(e),
        })?;
        Self::from_yaml_str(&contents, |name| std::env::var(name).ok())
    }

    /// Parse a YAML template, resolving variables through `lookup`.
    pub fn from_yaml_str<F>(template: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rendered = substitute_env(template, lookup);
        let config: AppConfig =
            serde_yaml::from_str(&rendered).map_err(|e| ConfigError::YamlParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("email.username", &self.email.username, "Set GMAIL_USERNAME")?;
        require(
            "email.password",
            self.email.password.expose_secret(),
            "Set GMAIL_APP_PASSWORD",
        )?;
        require(
            "slack.api_token",
            self.slack.api_token.expose_secret(),
            "Set SLACK_API_TOKEN",
        )?;
        require(
            "slack.default_channel",
            &self.slack.default_channel,
            "Name a fallback channel",
        )?;
        require(
            "perplexity.api_key",
            self.perplexity.api_key.expose_secret(),
            "Set PPLX_API_KEY",
        )?;
        if self.research_topics.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "research_topics".into(),
                hint: "Configure at least one topic".into(),
            });
        }
        Ok(())
    }
}

/// A value is missing if empty or still an unresolved `$VAR` placeholder.
fn require(key: &str, value: &str, hint: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() || is_placeholder(value) {
        return Err(ConfigError::MissingRequired {
            key: key.into(),
            hint: hint.into(),
        });
    }
    Ok(())
}

fn is_placeholder(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('$') else {
        return false;
    };
    let name = rest
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(rest);
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replace `$NAME` / `${NAME}` with values from `lookup`.
pub fn substitute_env<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    TEMPLATE_VAR
        .replace_all(template, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r##"
email:
  username: ${GMAIL_USERNAME}
  password: $GMAIL_APP_PASSWORD
  folder: "Scholar Alerts"
slack:
  api_token: ${SLACK_API_TOKEN}
  default_channel: "#scholar-scout-default"
  channel_topics:
    systems: ["Serverless Computing"]
perplexity:
  api_key: ${PPLX_API_KEY}
research_topics:
  - name: LLM Inference
    description: LLM inference research
    keywords: [llm, inference]
    slack_users: ["@alice"]
  - name: Serverless Computing
    description: Serverless computing research
    slack_channel: "#serverless"
email_filter:
  subject: ["new results", "new articles"]
  time_window: 7D
email_cleanup:
  time_window: 4W
"##;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn full_env() -> impl Fn(&str) -> Option<String> {
        env(&[
            ("GMAIL_USERNAME", "me@example.com"),
            ("GMAIL_APP_PASSWORD", "app-pass"),
            ("SLACK_API_TOKEN", "xoxb-1"),
            ("PPLX_API_KEY", "pplx-1"),
        ])
    }

    #[test]
    fn substitute_braced_and_bare_variables() {
        let out = substitute_env("a=${A} b=$B c=$$C", env(&[("A", "1"), ("B", "2")]));
        assert_eq!(out, "a=1 b=2 c=$C");
    }

    #[test]
    fn substitute_leaves_unknown_variables() {
        let out = substitute_env("key: ${MISSING}", env(&[]));
        assert_eq!(out, "key: ${MISSING}");
    }

    #[test]
    fn load_sample_config() {
        let config = AppConfig::from_yaml_str(SAMPLE, full_env()).unwrap();
        assert_eq!(config.email.username, "me@example.com");
        assert_eq!(config.email.password.expose_secret(), "app-pass");
        assert_eq!(config.email.folder, "Scholar Alerts");
        assert_eq!(config.email.imap_host, "imap.gmail.com");
        assert_eq!(config.perplexity.model, "sonar-pro");
        assert_eq!(config.perplexity.base_url, "https://api.perplexity.ai");
        assert_eq!(config.research_topics.len(), 2);
        assert_eq!(config.research_topics[0].slack_users, vec!["@alice"]);
        assert_eq!(
            config.research_topics[1].slack_channel.as_deref(),
            Some("#serverless")
        );
        assert_eq!(config.slack.channel_topics["systems"], vec!["Serverless Computing"]);
        assert_eq!(
            config.email_filter.time_window.unwrap().duration(),
            TimeDelta::days(7)
        );
        assert_eq!(
            config.email_cleanup.unwrap().time_window.duration(),
            TimeDelta::weeks(4)
        );
    }

    #[test]
    fn unresolved_secret_is_missing() {
        let result = AppConfig::from_yaml_str(
            SAMPLE,
            env(&[
                ("GMAIL_USERNAME", "me@example.com"),
                ("SLACK_API_TOKEN", "xoxb-1"),
                ("PPLX_API_KEY", "pplx-1"),
            ]),
        );
        match result {
            Err(ConfigError::MissingRequired { key, .. }) => assert_eq!(key, "email.password"),
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let result = AppConfig::from_yaml_str("email: [unclosed", full_env());
        assert!(matches!(result, Err(ConfigError::YamlParse(_))));
    }

    #[test]
    fn bad_time_window_fails_parse() {
        let yaml = SAMPLE.replace("time_window: 7D", "time_window: 7Y");
        let result = AppConfig::from_yaml_str(&yaml, full_env());
        assert!(matches!(result, Err(ConfigError::YamlParse(_))));
    }

    #[test]
    fn time_window_units() {
        assert_eq!("3D".parse::<TimeWindow>().unwrap().duration(), TimeDelta::days(3));
        assert_eq!("2w".parse::<TimeWindow>().unwrap().duration(), TimeDelta::weeks(2));
        assert_eq!("1M".parse::<TimeWindow>().unwrap().duration(), TimeDelta::days(30));
        assert!("".parse::<TimeWindow>().is_err());
        assert!("D".parse::<TimeWindow>().is_err());
        assert!("-1D".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn time_window_rejects_zero_and_huge_amounts() {
        for input in ["0D", "0W", "4294967295D", "5300W", "1300M"] {
            match input.parse::<TimeWindow>() {
                Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "time_window"),
                other => panic!("{input}: expected InvalidValue, got {other:?}"),
            }
        }
        let longest: TimeWindow = "36500D".parse().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(longest.start_date(today), today - TimeDelta::days(36_500));
    }

    #[test]
    fn huge_cleanup_window_is_rejected_at_load() {
        let yaml = SAMPLE.replace("time_window: 4W", "time_window: 4294967295D");
        let result = AppConfig::from_yaml_str(&yaml, full_env());
        assert!(matches!(result, Err(ConfigError::YamlParse(_))));
    }

    #[test]
    fn time_window_start_date() {
        let window: TimeWindow = "1W".parse().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(
            window.start_date(today),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
    }

    #[test]
    fn subject_filter_empty_accepts_all() {
        let filter = EmailFilter::default();
        assert!(filter.accepts_subject("anything"));
        assert_eq!(filter.from, DEFAULT_ALERT_SENDER);
    }

    #[test]
    fn subject_filter_substring_match() {
        let filter = EmailFilter {
            subject: vec!["new results".into()],
            ..Default::default()
        };
        assert!(filter.accepts_subject("Ada Lovelace - new results"));
        assert!(!filter.accepts_subject("Weekly digest"));
    }

    #[test]
    fn load_missing_file() {
        let result = AppConfig::load(Path::new("/definitely/not/here.yml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn load_from_disk_without_env_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let yaml = SAMPLE.replace("${GMAIL_USERNAME}", "\"\"").replace(
            "$GMAIL_APP_PASSWORD",
            "literal-pass",
        );
        file.write_all(yaml.as_bytes()).unwrap();
        let result = AppConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::MissingRequired { .. })));
    }
}
