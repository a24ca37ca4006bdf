//! Notifier configuration, loaded once from environment variables.
//!
//! | Variable               | Default          |
//! |------------------------|------------------|
//! | `WEBHOOK_URLS`         | required         |
//! | `WEBHOOK_<N>_HEADERS`  | none             |
//! | `WEBHOOK_<N>_TIMEOUT`  | `30s`            |
//! | `CHECK_INTERVAL`       | `24h`            |
//! | `EXPIRATION_THRESHOLD` | `720h`           |
//! | `NAMESPACE`            | all namespaces   |
//! | `HEALTH_PORT`          | `8080`           |
//! | `LOG_LEVEL`            | `info`           |
//! | `LOG_FORMAT`           | `json`           |
//!
//! `<N>` is the 1-based position of a URL in `WEBHOOK_URLS`. Malformed
//! optional values fall back to their defaults.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_EXPIRATION_THRESHOLD: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_PORT: u16 = 8080;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("WEBHOOK_URLS environment variable is required")]
    MissingWebhookUrls,
    #[error("no valid webhooks configured")]
    NoWebhooks,
}

/// One outbound webhook target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    pub name: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl DestinationConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "text" | "pretty" | "plain" => Some(LogFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    pub webhooks: Vec<DestinationConfig>,
    pub check_interval: Duration,
    pub expiration_threshold: Duration,
    /// `None` watches every namespace.
    pub namespace: Option<String>,
    pub health_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl NotifierConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let webhooks = load_webhooks(&get)?;

        let check_interval = get("CHECK_INTERVAL")
            .and_then(|raw| parse_duration(&raw))
            .filter(|interval| !interval.is_zero())
            .unwrap_or(DEFAULT_CHECK_INTERVAL);
        let expiration_threshold = get("EXPIRATION_THRESHOLD")
            .and_then(|raw| parse_duration(&raw))
            .unwrap_or(DEFAULT_EXPIRATION_THRESHOLD);
        let namespace = get("NAMESPACE").map(|raw| raw.trim().to_string());
        let health_port = get("HEALTH_PORT")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_HEALTH_PORT);
        let log_level = get("LOG_LEVEL")
            .map(|raw| raw.trim().to_string())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let log_format = get("LOG_FORMAT")
            .and_then(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();

        Ok(Self {
            webhooks,
            check_interval,
            expiration_threshold,
            namespace,
            health_port,
            log_level,
            log_format,
        })
    }
}

fn load_webhooks<F>(get: &F) -> Result<Vec<DestinationConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let urls = get("WEBHOOK_URLS").ok_or(ConfigError::MissingWebhookUrls)?;

    let mut webhooks = Vec::new();
    // Numbering follows the raw list position, so blank entries still
    // consume an index.
    for (index, url) in urls.split(',').enumerate() {
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        let position = index + 1;
        let mut webhook = DestinationConfig::new(format!("webhook-{position}"), url);

        if let Some(raw) = get(&format!("WEBHOOK_{position}_HEADERS")) {
            webhook.headers = parse_headers(&raw);
        }
        if let Some(timeout) =
            get(&format!("WEBHOOK_{position}_TIMEOUT")).and_then(|raw| parse_duration(&raw))
        {
            webhook.timeout = timeout;
        }

        webhooks.push(webhook);
    }

    if webhooks.is_empty() {
        return Err(ConfigError::NoWebhooks);
    }
    Ok(webhooks)
}

/// Parses `Name:Value,Name2:Value2`; pairs without a colon are dropped.
pub fn parse_headers(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

pub fn parse_duration(raw: &str) -> Option<Duration> {
    humantime::parse_duration(raw.trim()).ok()
}
