//! Config validation CLI tool
//!
//! Validates a fleetdesk agent configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("Usage: validate-config <config-file>");
            eprintln!();
            eprintln!("Validates a fleetdesk agent configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config /etc/fleetdesk/agent.toml");
            eprintln!("  validate-config agent.example.toml");
            return ExitCode::from(2);
        }
    };

    // Check file exists
    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    // Try to load and validate
    match fleetdesk_config::load_config(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", fleetdesk_config::CURRENT_CONFIG_VERSION);
            println!("  Backend: {}", config.backend.base_url);
            println!("  Connectivity check: {}", config.connectivity.check_url);
            println!(
                "  Check interval: {}s",
                config.connectivity.check_interval.as_secs()
            );
            println!("  Data dir: {}", config.agent.data_dir.display());
            println!(
                "  Session TTL: {}m, profile TTL: {}m",
                config.auth.session_ttl.as_secs() / 60,
                config.auth.profile_ttl.as_secs() / 60
            );
            println!("  Refresh fraction: {}", config.auth.refresh_fraction);
            println!("  Queue max retries: {}", config.auth.max_retries);

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                fleetdesk_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                fleetdesk_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                fleetdesk_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                fleetdesk_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        fleetdesk_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
