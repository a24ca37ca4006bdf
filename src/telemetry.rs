use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use certnotify_domain::config::DEFAULT_LOG_LEVEL;
use certnotify_domain::{ConfigError, LogFormat, NotifierConfig};

/// Installs the global subscriber. Invalid `level` directives fall back to `info`.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::new(filter_directive(level));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Text => registry.with(fmt::layer()).try_init()?,
    }
    Ok(())
}

/// Logging settings for a load attempt; a failed load logs with the defaults.
pub fn settings_for(loaded: &Result<NotifierConfig, ConfigError>) -> (&str, LogFormat) {
    match loaded {
        Ok(config) => (config.log_level.as_str(), config.log_format),
        Err(_) => (DEFAULT_LOG_LEVEL, LogFormat::default()),
    }
}

fn filter_directive(level: &str) -> &str {
    if EnvFilter::try_new(level).is_ok() {
        level
    } else {
        DEFAULT_LOG_LEVEL
    }
}
