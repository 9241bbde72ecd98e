//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Backend config error: {0}")]
    BackendError(String),

    #[error("Invalid URL '{value}': {message}")]
    InvalidUrl { value: String, message: String },

    #[error("Auth config error: {0}")]
    AuthError(String),

    #[error("Agent config error: {0}")]
    AgentError(String),
}

/// Validate a raw configuration. All errors are collected, not just the
/// first.
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Backend URL is required and must be http(s)
    if config.backend.base_url.is_empty() {
        errors.push(ValidationError::BackendError(
            "base_url cannot be empty".into(),
        ));
    } else if let Err(e) = validate_url(&config.backend.base_url) {
        errors.push(ValidationError::InvalidUrl {
            value: config.backend.base_url.clone(),
            message: e,
        });
    }

    if let Some(url) = &config.connectivity.check_url
        && let Err(e) = validate_url(url)
    {
        errors.push(ValidationError::InvalidUrl {
            value: url.clone(),
            message: e,
        });
    }

    if let Some(fraction) = config.auth.refresh_fraction
        && !(fraction > 0.0 && fraction < 1.0)
    {
        errors.push(ValidationError::AuthError(format!(
            "refresh_fraction must be in (0, 1), got {}",
            fraction
        )));
    }

    if config.auth.max_retries == Some(0) {
        errors.push(ValidationError::AuthError(
            "max_retries must be at least 1".into(),
        ));
    }

    if config.agent.prune_interval_seconds == Some(0) {
        errors.push(ValidationError::AgentError(
            "prune_interval_seconds must be at least 1".into(),
        ));
    }

    if config.agent.health_interval_seconds == Some(0) {
        errors.push(ValidationError::AgentError(
            "health_interval_seconds must be at least 1".into(),
        ));
    }

    errors
}

/// Minimal http(s) URL shape check
pub fn validate_url(s: &str) -> Result<(), String> {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .ok_or_else(|| "expected http:// or https:// scheme".to_string())?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err("missing host".into());
    }

    Ok(())
}
