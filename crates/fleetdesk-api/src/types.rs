//! Core data model for the auth store

use chrono::{DateTime, Local};
use fleetdesk_util::UserId;
use serde::{Deserialize, Serialize};

/// The identity a session authenticates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub email: String,
}

/// An authenticated session: token pair plus absolute expiry.
///
/// Exclusively owned by the session manager. The cache layer holds a copy
/// with its own TTL; losing the cached copy never invalidates the live
/// session. Never written to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Local>,
    pub user: UserIdentity,
}

impl Session {
    /// Seconds of lifetime remaining relative to `now` (zero if expired)
    pub fn seconds_remaining(&self, now: DateTime<Local>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Role assigned to a dashboard user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Technician,
    Supervisor,
    Admin,
    Viewer,
}

/// User-identity metadata, keyed by user identifier.
///
/// Cached with a longer TTL than sessions because it changes less often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub display_name: String,
    pub role: UserRole,
    /// Organizational affiliations (site codes, depots)
    #[serde(default)]
    pub organizations: Vec<String>,
    pub updated_at: DateTime<Local>,
}

/// Auth store state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
    Errored,
    Refreshing,
    SigningOut,
}

/// Where the last successful auth check was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthCheckSource {
    /// Reused already-held in-memory user + profile
    Memory,
    /// Reused a cached session
    Cache,
    /// Fetched a fresh session from the backend
    Backend,
}

/// Read-only queue statistics for diagnostics and UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub failed: usize,
    pub total: usize,
}

/// Composite metrics snapshot used by the health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub average_auth_latency_ms: f64,
    pub session_stability: f64,
    pub offline_operations: u64,
    pub failed_operations: u64,
    pub cache_hit_rate: f64,
    pub last_update: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn make_session(expires_in_secs: i64) -> Session {
        let now = Local::now();
        Session {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: now + ChronoDuration::seconds(expires_in_secs),
            user: UserIdentity {
                id: UserId::new("user-1"),
                email: "tech@depot.example".into(),
            },
        }
    }

    #[test]
    fn session_seconds_remaining() {
        let session = make_session(600);
        let remaining = session.seconds_remaining(Local::now());
        assert!(remaining > 595 && remaining <= 600);
    }

    #[test]
    fn expired_session_remaining_is_zero() {
        let session = make_session(-60);
        assert_eq!(session.seconds_remaining(Local::now()), 0);
    }

    #[test]
    fn profile_round_trips() {
        let profile = Profile {
            id: UserId::new("user-1"),
            display_name: "Dana Reyes".into(),
            role: UserRole::Supervisor,
            organizations: vec!["depot-north".into()],
            updated_at: Local::now(),
        };

        let json = serde_json::to_string(&profile).unwrap();
        let parsed: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, parsed);
    }
}
