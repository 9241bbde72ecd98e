//! Store trait definitions

use chrono::{DateTime, Local};
use fleetdesk_api::{AuthCheckSource, OfflineOperation, Profile, UserIdentity};

use crate::StoreResult;

/// Main store trait
pub trait Store: Send + Sync {
    /// Load the last saved snapshot
    fn load_snapshot(&self) -> StoreResult<Option<PersistedState>>;

    /// Save a state snapshot
    fn save_snapshot(&self, snapshot: &PersistedState) -> StoreResult<()>;

    /// Check if the store is healthy
    fn is_healthy(&self) -> bool;
}

/// The restricted subset of auth state that survives restarts.
///
/// Session tokens and timer handles are not fields of this type; persistence
/// of either is excluded by construction.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PersistedState {
    /// Signed-in user identity (if any)
    pub user: Option<UserIdentity>,

    /// Loaded profile (if any)
    pub profile: Option<Profile>,

    /// When the last successful auth check completed
    pub last_auth_check: Option<DateTime<Local>>,

    /// Where the last auth check was resolved from
    pub auth_check_source: Option<AuthCheckSource>,

    /// Cache counters (restored so hit-rate history survives restarts)
    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Offline operations awaiting replay
    #[serde(default)]
    pub pending_operations: Vec<OfflineOperation>,

    /// Operations that exhausted their retries
    #[serde(default)]
    pub failed_operations: Vec<OfflineOperation>,

    /// Timestamp of this snapshot
    pub saved_at: Option<DateTime<Local>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetdesk_api::OperationKind;

    #[test]
    fn persisted_state_has_no_token_fields() {
        // The snapshot must round-trip without any session/token material.
        let state = PersistedState {
            user: Some(UserIdentity {
                id: "user-1".into(),
                email: "tech@depot.example".into(),
            }),
            pending_operations: vec![OfflineOperation::new(
                OperationKind::SessionRefresh,
                3,
                fleetdesk_util::now(),
            )],
            ..Default::default()
        };

        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains("access_token"));
        assert!(!json.contains("refresh_token"));

        let parsed: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.pending_operations.len(), 1);
    }
}
