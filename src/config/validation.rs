use crate::config::types::{
    CategoriesConfig, Config, JobConfig, ModeConfig, OutputConfig, ResilienceConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_job_config(&config.job)?;
    validate_endpoint("crawler.endpoint", &config.crawler.endpoint)?;
    validate_endpoint("store.base-url", &config.store.base_url)?;
    if config.store.page_size == 0 {
        return Err(ConfigError::Validation(
            "store.page-size must be >= 1".to_string(),
        ));
    }
    if let Some(llm) = &config.llm {
        validate_endpoint("llm.endpoint", &llm.endpoint)?;
        if llm.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.model cannot be empty".to_string(),
            ));
        }
    }
    validate_resilience_config(&config.resilience)?;
    validate_mode_config(&config.mode, config.llm.is_some())?;
    validate_categories_config(&config.categories)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_job_config(config: &JobConfig) -> Result<(), ConfigError> {
    validate_endpoint("job.start-url", &config.start_url)?;

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "job.max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "job.workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if let Some(category) = &config.category {
        if category.trim().is_empty() {
            return Err(ConfigError::Validation(
                "job.category cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates that a configured URL parses and uses HTTP(S)
fn validate_endpoint(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

fn validate_resilience_config(config: &ResilienceConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "resilience.max-attempts must be >= 1".to_string(),
        ));
    }

    if config.exponential_base < 1.0 || !config.exponential_base.is_finite() {
        return Err(ConfigError::Validation(format!(
            "resilience.exponential-base must be >= 1.0, got {}",
            config.exponential_base
        )));
    }

    if config.initial_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "resilience.initial-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.initial_delay_ms, config.max_delay_ms
        )));
    }

    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(
            "resilience.failure-threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_mode_config(config: &ModeConfig, has_llm: bool) -> Result<(), ConfigError> {
    if config.intelligent && !has_llm {
        return Err(ConfigError::Validation(
            "mode.intelligent requires an [llm] section".to_string(),
        ));
    }

    if config.threshold == 0 {
        return Err(ConfigError::Validation(
            "mode.threshold must be >= 1".to_string(),
        ));
    }

    for pattern in &config.full_doc_patterns {
        if pattern.trim_matches('*').trim().is_empty() {
            return Err(ConfigError::InvalidPattern(format!(
                "Full-doc pattern '{}' matches nothing",
                pattern
            )));
        }
    }

    Ok(())
}

fn validate_categories_config(config: &CategoriesConfig) -> Result<(), ConfigError> {
    validate_ratio("categories.similarity-threshold", config.similarity_threshold)?;
    validate_ratio("categories.keyword-threshold", config.keyword_threshold)?;

    if config.max_length < 4 {
        return Err(ConfigError::Validation(format!(
            "categories.max-length must be >= 4, got {}",
            config.max_length
        )));
    }

    Ok(())
}

/// Thresholds are ratios in (0, 1]
fn validate_ratio(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "{} must be in (0, 1], got {}",
            field, value
        )));
    }
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.checkpoint_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output.checkpoint-dir cannot be empty".to_string(),
        ));
    }

    if config.failure_queue_path.is_empty() || config.failure_report_path.is_empty() {
        return Err(ConfigError::Validation(
            "output failure paths cannot be empty".to_string(),
        ));
    }

    if config.save_interval < 1 {
        return Err(ConfigError::Validation(
            "output.save-interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}
