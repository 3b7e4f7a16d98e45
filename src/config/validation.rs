use crate::config::types::{ApiConfig, Config, CrawlerConfig, FetchConfig, OutputConfig};
use crate::retailer::RetailerTable;
use crate::ConfigError;
use std::net::SocketAddr;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    validate_api_config(&config.api)?;
    RetailerTable::build(&config.retailers)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.global_concurrency < 1 || config.global_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "global_concurrency must be between 1 and 100, got {}",
            config.global_concurrency
        )));
    }

    if config.per_domain_concurrency < 1 || config.per_domain_concurrency > config.global_concurrency
    {
        return Err(ConfigError::Validation(format!(
            "per_domain_concurrency must be between 1 and global_concurrency ({}), got {}",
            config.global_concurrency, config.per_domain_concurrency
        )));
    }

    if config.default_max_products < 1 {
        return Err(ConfigError::Validation(
            "default_max_products must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.retry_times > 10 {
        return Err(ConfigError::Validation(format!(
            "retry_times must be <= 10, got {}",
            config.retry_times
        )));
    }

    if let Some(endpoint) = &config.render_endpoint {
        let url = Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid render_endpoint: {}", e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "render_endpoint must be HTTP(S), got '{}'",
                endpoint
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    config.bind.parse::<SocketAddr>().map_err(|e| {
        ConfigError::Validation(format!("Invalid api bind address '{}': {}", config.bind, e))
    })?;

    Ok(())
}
