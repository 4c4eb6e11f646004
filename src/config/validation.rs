use crate::config::types::{BrowserConfig, Config, CrawlerConfig};
use crate::site::SiteDefinition;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;

    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.sites.is_empty() && !config.debug.demo {
        return Err(ConfigError::Validation(
            "at least one [[sites]] entry is required".to_string(),
        ));
    }

    let mut slugs = HashSet::new();
    for site in &config.sites {
        validate_site(site)?;
        if !slugs.insert(site.slug.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site slug '{}'",
                site.slug
            )));
        }
    }

    Ok(())
}

/// Validates crawl pacing configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.interval_secs < 10 {
        return Err(ConfigError::Validation(format!(
            "interval-secs must be >= 10, got {}",
            config.interval_secs
        )));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= 1000, got {}",
            config.timeout_ms
        )));
    }

    Ok(())
}

/// Validates one site definition
fn validate_site(site: &SiteDefinition) -> Result<(), ConfigError> {
    if site.slug.is_empty() {
        return Err(ConfigError::Validation(
            "site slug cannot be empty".to_string(),
        ));
    }

    if !site
        .slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "site slug '{}' must contain only alphanumerics, dots, hyphens and underscores",
            site.slug
        )));
    }

    let url = Url::parse(&site.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("site '{}': {}", site.slug, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "site '{}' URL must be http(s), got '{}'",
            site.slug,
            url.scheme()
        )));
    }

    if site.currency.len() != 3 || !site.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "site '{}' currency must be a three-letter uppercase code, got '{}'",
            site.slug, site.currency
        )));
    }

    if site.vat_rate < 1.0 {
        return Err(ConfigError::Validation(format!(
            "site '{}' vat-rate must be >= 1.0, got {}",
            site.slug, site.vat_rate
        )));
    }

    if site.selector.is_empty() {
        return Err(ConfigError::Validation(format!(
            "site '{}' selector cannot be empty",
            site.slug
        )));
    }

    if site.rule.body.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "site '{}' extraction rule body cannot be empty",
            site.slug
        )));
    }

    if site.rule.params.is_empty() || site.rule.params.len() > 3 {
        return Err(ConfigError::Validation(format!(
            "site '{}' extraction rule must declare 1 to 3 parameters, got {}",
            site.slug,
            site.rule.params.len()
        )));
    }

    Ok(())
}
