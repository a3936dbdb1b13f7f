use crate::config::types::{
    Config, FetchConfig, OutputConfig, PipelineConfig, SiteConfig, StatusConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Upper bound for every worker pool
const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pipeline_config(&config.pipeline)?;
    validate_fetch_config(&config.fetch)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    validate_status_config(&config.status)?;
    Ok(())
}

/// Validates targets and pool sizes
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.target_jobs < 1 {
        return Err(ConfigError::Validation(
            "target_jobs must be >= 1".to_string(),
        ));
    }

    if config.archive_cap < 1 {
        return Err(ConfigError::Validation(
            "archive_cap must be >= 1".to_string(),
        ));
    }

    for (name, size) in [
        ("discoverer_workers", config.discoverer_workers),
        ("scraper_workers", config.scraper_workers),
        ("archiver_workers", config.archiver_workers),
    ] {
        if size < 1 || size > MAX_WORKERS {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_WORKERS, size
            )));
        }
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    if config.idle_flush_ms < 1 {
        return Err(ConfigError::Validation(
            "idle_flush_ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry and rate limit settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max_retries must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeouts must be >= 1 second".to_string(),
        ));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain empty entries".to_string(),
        ));
    }

    if let Some(proxy) = &config.render_proxy {
        Url::parse(&proxy.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid render proxy endpoint: {}", e))
        })?;

        if proxy.api_key_env.is_empty() {
            return Err(ConfigError::Validation(
                "render proxy api_key_env cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates the site layout
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if !config.search_url.contains("{page}") || !config.search_url.contains("{term}") {
        return Err(ConfigError::Validation(format!(
            "search_url must contain both {{page}} and {{term}}, got '{}'",
            config.search_url
        )));
    }

    // Parse the template with placeholder values filled in
    let sample = config
        .search_url
        .replace("{page}", "1")
        .replace("{term}", "sample");
    Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search_url: {}", e)))?;

    Selector::parse(&config.detail_link_selector).map_err(|e| {
        ConfigError::InvalidSelector(format!("'{}': {:?}", config.detail_link_selector, e))
    })?;

    if config.search_terms.is_empty() {
        return Err(ConfigError::Validation(
            "search_terms must contain at least one term".to_string(),
        ));
    }

    if config.search_terms.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "search_terms cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates output file names
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("csv_file", &config.csv_file),
        ("json_file", &config.json_file),
        ("database_file", &config.database_file),
        ("html_dir", &config.html_dir),
        ("archive_file", &config.archive_file),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates the status line and completion polling intervals
fn validate_status_config(config: &StatusConfig) -> Result<(), ConfigError> {
    if config.interval_ms < 1 {
        return Err(ConfigError::Validation(
            "status interval_ms must be >= 1".to_string(),
        ));
    }

    if config.completion_poll_ms < 1 {
        return Err(ConfigError::Validation(
            "completion_poll_ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}
