use crate::config::types::{
    Config, CrawlerConfig, EscalationConfig, OutputConfig, PipelineConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_escalation_config(&config.escalation)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if config.max_redirects == 0 || config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be between 1 and 20, got {}",
            config.max_redirects
        )));
    }

    if config.max_content_chars < 100 {
        return Err(ConfigError::Validation(format!(
            "max_content_chars must be >= 100, got {}",
            config.max_content_chars
        )));
    }

    for host in &config.trusted_hosts {
        if host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "trusted_hosts cannot contain empty entries".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.stale_threshold_secs == 0 {
        return Err(ConfigError::Validation(
            "stale_threshold_secs must be greater than zero".to_string(),
        ));
    }

    if config.retry_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "retry_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_escalation_config(config: &EscalationConfig) -> Result<(), ConfigError> {
    if config.hard_timeout_secs <= config.delay_notice_secs {
        return Err(ConfigError::Validation(format!(
            "hard_timeout_secs ({}) must exceed delay_notice_secs ({})",
            config.hard_timeout_secs, config.delay_notice_secs
        )));
    }

    if config.support_alert_retries == 0 {
        return Err(ConfigError::Validation(
            "support_alert_retries must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
