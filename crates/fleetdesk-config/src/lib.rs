//! Configuration parsing and validation for the fleetdesk agent
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Backend, connectivity, agent, and auth tuning sections
//! - Validation with clear error messages

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let raw: RawConfig = toml::from_str(content)?;

    // Check version
    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    // Validate
    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    // Convert to resolved settings
    Ok(Config::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1

            [backend]
            base_url = "https://identity.fleetdesk.example"
        "#;

        let config = parse_config(config).unwrap();
        assert_eq!(config.backend.base_url, "https://identity.fleetdesk.example");
        // Defaults fill the rest
        assert_eq!(config.auth.session_ttl, Duration::from_secs(30 * 60));
        assert_eq!(config.auth.profile_ttl, Duration::from_secs(10 * 60));
        assert_eq!(config.agent.prune_interval, Duration::from_secs(300));
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [backend]
            base_url = "https://identity.fleetdesk.example"
            anon_key = "public-key"

            [connectivity]
            check_url = "https://identity.fleetdesk.example/health"
            check_interval_seconds = 15
            check_timeout_seconds = 3

            [agent]
            data_dir = "/var/lib/fleetdesk"
            prune_interval_seconds = 120
            health_interval_seconds = 30

            [auth]
            session_ttl_minutes = 20
            profile_ttl_minutes = 5
            refresh_fraction = 0.5
            max_retries = 2
        "#;

        let config = parse_config(config).unwrap();
        assert_eq!(config.connectivity.check_interval, Duration::from_secs(15));
        assert_eq!(config.auth.session_ttl, Duration::from_secs(20 * 60));
        assert_eq!(config.auth.refresh_fraction, 0.5);
        assert_eq!(config.auth.max_retries, 2);
        assert_eq!(config.agent.health_interval, Duration::from_secs(30));
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99

            [backend]
            base_url = "https://identity.fleetdesk.example"
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_missing_backend_url() {
        let config = r#"
            config_version = 1

            [backend]
            base_url = ""
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }
}
