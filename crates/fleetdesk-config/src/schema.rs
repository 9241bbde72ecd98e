//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Identity backend settings
    pub backend: RawBackendConfig,

    /// Connectivity monitoring settings
    #[serde(default)]
    pub connectivity: RawConnectivityConfig,

    /// Agent process settings
    #[serde(default)]
    pub agent: RawAgentConfig,

    /// Auth store tuning
    #[serde(default)]
    pub auth: RawAuthConfig,
}

/// Identity backend settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBackendConfig {
    /// Base URL of the identity API
    pub base_url: String,

    /// Public (anonymous) API key sent with unauthenticated requests
    pub anon_key: Option<String>,
}

/// Connectivity monitoring settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConnectivityConfig {
    /// URL used for reachability checks (default: backend base URL)
    pub check_url: Option<String>,

    /// How often to perform periodic connectivity checks
    pub check_interval_seconds: Option<u64>,

    /// Timeout for a single connectivity check
    pub check_timeout_seconds: Option<u64>,
}

/// Agent process settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAgentConfig {
    /// Data directory for the snapshot store
    pub data_dir: Option<PathBuf>,

    /// How often to prune expired cache entries
    pub prune_interval_seconds: Option<u64>,

    /// How often to evaluate aggregate health
    pub health_interval_seconds: Option<u64>,

    /// How often to persist the state snapshot
    pub snapshot_interval_seconds: Option<u64>,
}

/// Auth store tuning
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAuthConfig {
    /// Session cache TTL in minutes
    pub session_ttl_minutes: Option<u64>,

    /// Profile cache TTL in minutes
    pub profile_ttl_minutes: Option<u64>,

    /// Fraction of remaining session lifetime after which to refresh
    pub refresh_fraction: Option<f64>,

    /// Settle delay after reconnect before draining the offline queue (ms)
    pub queue_settle_ms: Option<u64>,

    /// Replay attempts before an offline operation is parked as failed
    pub max_retries: Option<u32>,
}
