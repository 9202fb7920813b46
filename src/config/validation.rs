use crate::config::types::{
    Config, CrawlConfig, LimiterConfig, ScraperEntry, UserAgentConfig, VersioningConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_limiter_config(&config.limiter)?;
    validate_versioning_config(&config.versioning)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_scraper_entries(&config.scraper)?;
    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 100, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_pages_per_run < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages_per_run must be >= 1, got {}",
            config.max_pages_per_run
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

/// Validates rate limiter bounds
fn validate_limiter_config(config: &LimiterConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms must be >= 100ms, got {}ms",
            config.min_delay_ms
        )));
    }

    if config.max_delay_ms < config.min_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms ({}ms) must be >= min_delay_ms ({}ms)",
            config.max_delay_ms, config.min_delay_ms
        )));
    }

    if config.default_delay_ms < config.min_delay_ms || config.default_delay_ms > config.max_delay_ms
    {
        return Err(ConfigError::Validation(format!(
            "default_delay_ms ({}ms) must be within [{}ms, {}ms]",
            config.default_delay_ms, config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.sensitive_delay_ms < config.min_delay_ms {
        return Err(ConfigError::Validation(format!(
            "sensitive_delay_ms ({}ms) must be >= min_delay_ms ({}ms)",
            config.sensitive_delay_ms, config.min_delay_ms
        )));
    }

    if let Some(rpm) = config.requests_per_minute {
        if rpm < 1 {
            return Err(ConfigError::Validation(
                "requests_per_minute must be >= 1 when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates version tracking defaults
fn validate_versioning_config(config: &VersioningConfig) -> Result<(), ConfigError> {
    if config.max_versions_to_keep < 1 {
        return Err(ConfigError::Validation(format!(
            "max_versions_to_keep must be >= 1, got {}",
            config.max_versions_to_keep
        )));
    }

    if let Some(email) = &config.notification_email {
        if !email.is_empty() {
            validate_email(email)?;
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

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates scraper entries
fn validate_scraper_entries(entries: &[ScraperEntry]) -> Result<(), ConfigError> {
    let mut seen_ids = Vec::new();

    for entry in entries {
        validate_scraper_id(&entry.id)?;

        if seen_ids.contains(&entry.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate scraper id '{}'",
                entry.id
            )));
        }
        seen_ids.push(entry.id.as_str());

        if entry.seeds.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Scraper '{}' must have at least one seed URL",
                entry.id
            )));
        }

        for seed in &entry.seeds {
            let url = Url::parse(seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' must use an http or https scheme",
                    seed
                )));
            }
        }

        if let Some(max) = entry.max_versions_to_keep {
            if max < 1 {
                return Err(ConfigError::Validation(format!(
                    "Scraper '{}': max_versions_to_keep must be >= 1",
                    entry.id
                )));
            }
        }

        if let Some(email) = &entry.notification_email {
            if !email.is_empty() {
                validate_email(email)?;
            }
        }
    }

    Ok(())
}

/// Validates a scraper identifier
fn validate_scraper_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Validation(
            "Scraper id cannot be empty".to_string(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "Scraper id must contain only alphanumeric characters, hyphens, and underscores, got '{}'",
            id
        )));
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

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
