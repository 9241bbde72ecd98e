//! Resolved configuration with defaults applied

use crate::schema::RawConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Resolved configuration ready for use by the agent
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub connectivity: ConnectivityConfig,
    pub agent: AgentConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let backend = BackendConfig {
            base_url: raw.backend.base_url.clone(),
            anon_key: raw.backend.anon_key,
        };

        let connectivity = ConnectivityConfig {
            check_url: raw
                .connectivity
                .check_url
                .unwrap_or_else(|| raw.backend.base_url.clone()),
            check_interval: Duration::from_secs(
                raw.connectivity.check_interval_seconds.unwrap_or(30),
            ),
            check_timeout: Duration::from_secs(
                raw.connectivity.check_timeout_seconds.unwrap_or(5),
            ),
        };

        let agent = AgentConfig {
            data_dir: raw
                .agent
                .data_dir
                .unwrap_or_else(|| PathBuf::from("/var/lib/fleetdesk")),
            prune_interval: Duration::from_secs(
                raw.agent.prune_interval_seconds.unwrap_or(300),
            ),
            health_interval: Duration::from_secs(
                raw.agent.health_interval_seconds.unwrap_or(60),
            ),
            snapshot_interval: Duration::from_secs(
                raw.agent.snapshot_interval_seconds.unwrap_or(300),
            ),
        };

        let auth = AuthConfig {
            session_ttl: Duration::from_secs(
                raw.auth.session_ttl_minutes.unwrap_or(30) * 60,
            ),
            profile_ttl: Duration::from_secs(
                raw.auth.profile_ttl_minutes.unwrap_or(10) * 60,
            ),
            refresh_fraction: raw.auth.refresh_fraction.unwrap_or(0.75),
            queue_settle: Duration::from_millis(raw.auth.queue_settle_ms.unwrap_or(1000)),
            max_retries: raw.auth.max_retries.unwrap_or(3),
        };

        Self {
            backend,
            connectivity,
            agent,
            auth,
        }
    }
}

/// Identity backend settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub anon_key: Option<String>,
}

/// Connectivity monitoring settings
#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    pub check_url: String,
    pub check_interval: Duration,
    pub check_timeout: Duration,
}

/// Agent process settings
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub data_dir: PathBuf,
    pub prune_interval: Duration,
    pub health_interval: Duration,
    pub snapshot_interval: Duration,
}

/// Auth store tuning
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_ttl: Duration,
    pub profile_ttl: Duration,
    pub refresh_fraction: f64,
    pub queue_settle: Duration,
    pub max_retries: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(30 * 60),
            profile_ttl: Duration::from_secs(10 * 60),
            refresh_fraction: 0.75,
            queue_settle: Duration::from_millis(1000),
            max_retries: 3,
        }
    }
}
