use crate::config::types::{
    CleanerConfig, Config, CrawlerConfig, FilterConfig, LlmConfig, OutputConfig, SearchConfig,
    SettingsOverride, UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_filter_config(&config.filter)?;
    validate_cleaner_config(&config.cleaner)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_llm_config(&config.llm)?;
    validate_search_config(&config.search)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    validate_patterns("exclude-url-patterns", &config.exclude_url_patterns)?;

    let mut depths = HashSet::new();
    for entry in &config.depth_overrides {
        if !depths.insert(entry.depth) {
            return Err(ConfigError::Validation(format!(
                "depth-overrides lists depth {} more than once",
                entry.depth
            )));
        }
        validate_override(&format!("depth-overrides[{}]", entry.depth), &entry.settings)?;
    }

    for entry in &config.url_overrides {
        if entry.pattern.is_empty() {
            return Err(ConfigError::Validation(
                "url-overrides pattern cannot be empty".to_string(),
            ));
        }
        validate_patterns("url-overrides pattern", std::slice::from_ref(&entry.pattern))?;
        validate_override(&format!("url-overrides['{}']", entry.pattern), &entry.settings)?;
    }

    Ok(())
}

fn validate_override(field: &str, settings: &SettingsOverride) -> Result<(), ConfigError> {
    if let Some(patterns) = &settings.exclude_url_patterns {
        validate_patterns(&format!("{} exclude-url-patterns", field), patterns)?;
    }
    if let Some(patterns) = &settings.exclude_content_patterns {
        validate_patterns(&format!("{} exclude-content-patterns", field), patterns)?;
    }
    Ok(())
}

fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    for ext in &config.binary_extensions {
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "binary extension '{}' must start with '.'",
                ext
            )));
        }
    }

    if config.accepted_content_types.is_empty() {
        return Err(ConfigError::Validation(
            "accepted-content-types cannot be empty".to_string(),
        ));
    }

    for mime in &config.accepted_content_types {
        if !mime.contains('/') {
            return Err(ConfigError::Validation(format!(
                "accepted content type '{}' is not a MIME type",
                mime
            )));
        }
    }

    Ok(())
}

fn validate_cleaner_config(config: &CleanerConfig) -> Result<(), ConfigError> {
    validate_patterns("exclude-content-patterns", &config.exclude_content_patterns)
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.generate_sitemap && config.sitemap_path.is_empty() {
        return Err(ConfigError::Validation(
            "sitemap-path cannot be empty when generate-sitemap is set".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm_config(config: &LlmConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    validate_http_url("llm endpoint", &config.endpoint)?;

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "llm temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    if config.max_tokens == 0 || config.max_input_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm max-tokens and max-input-tokens must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "llm timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    for instance in &config.instances {
        validate_http_url("search instance", instance)?;
    }

    if config.failure_threshold == 0 {
        return Err(ConfigError::Validation(
            "search failure-threshold must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "search timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Accepts only absolute http(s) URLs with a host
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, value
        )));
    }

    Ok(())
}

fn validate_patterns(field: &str, patterns: &[String]) -> Result<(), ConfigError> {
    for pattern in patterns {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("{} entry '{}': {}", field, pattern, e))
        })?;
    }
    Ok(())
}
