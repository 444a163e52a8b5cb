//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BotConfig, HeraldConfig, LogOutput, LoggingConfig, PollerConfig, ShutdownConfig, SourceConfig,
    WebhookConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_bot_config(&config.bot)?;
    validate_source_config(&config.source)?;
    validate_shutdown_config(&config.shutdown)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }
    if bot.token.contains(char::is_whitespace) || bot.token.contains('/') {
        return Err(ConfigError::validation(
            "Bot token cannot contain whitespace or '/'",
        ));
    }
    validate_url(&bot.api_url, &["http://", "https://"])?;

    if let Some(name) = &bot.name
        && (name.is_empty() || name.starts_with('@'))
    {
        return Err(ConfigError::validation(
            "Bot name must be a bare username without '@'",
        ));
    }
    Ok(())
}

fn validate_source_config(source: &SourceConfig) -> ConfigResult<()> {
    match source {
        SourceConfig::Poller(poller) => validate_poller_config(poller),
        SourceConfig::Webhook(webhook) => validate_webhook_config(webhook),
    }
}

fn validate_poller_config(poller: &PollerConfig) -> ConfigResult<()> {
    if poller.interval_ms == 0 {
        return Err(ConfigError::validation(
            "Poll interval must be greater than 0",
        ));
    }
    if poller.buffer_size == 0 {
        return Err(ConfigError::validation("Buffer size must be greater than 0"));
    }
    if !(1..=100).contains(&poller.limit) {
        return Err(ConfigError::validation(
            "Poll limit must be between 1 and 100",
        ));
    }
    Ok(())
}

fn validate_webhook_config(webhook: &WebhookConfig) -> ConfigResult<()> {
    if webhook.listen_addr.is_empty() {
        return Err(ConfigError::missing_field("source.listen_addr"));
    }
    validate_path(&webhook.path)?;
    if webhook.buffer_size == 0 {
        return Err(ConfigError::validation("Buffer size must be greater than 0"));
    }
    if webhook.enqueue_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "Enqueue timeout must be greater than 0",
        ));
    }
    if let Some(secret) = &webhook.secret_token {
        validate_secret_token(secret)?;
    }
    if let Some(url) = &webhook.public_url {
        validate_url(url, &["https://"])?;
    }
    Ok(())
}

fn validate_shutdown_config(shutdown: &ShutdownConfig) -> ConfigResult<()> {
    if shutdown.start_timeout_ms == 0 || shutdown.stop_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "Lifecycle timeouts must be greater than 0",
        ));
    }
    Ok(())
}

/// The upstream accepts 1-256 characters from `A-Z`, `a-z`, `0-9`, `_` and `-`.
fn validate_secret_token(secret: &str) -> ConfigResult<()> {
    let valid_chars = secret
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if secret.is_empty() || secret.len() > 256 || !valid_chars {
        return Err(ConfigError::validation(
            "Secret token must be 1-256 characters of A-Z, a-z, 0-9, '_' or '-'",
        ));
    }
    Ok(())
}

fn validate_url(url: &str, schemes: &[&str]) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("url"));
    }
    if !schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {schemes:?}"),
        ));
    }
    Ok(())
}

fn validate_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::validation("Path must start with '/'"));
    }
    Ok(())
}
