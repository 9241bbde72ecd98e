//! Offline operation types
//!
//! Auth-affecting operations requested while the network is unavailable are
//! buffered as `OfflineOperation`s and replayed in enqueue order when
//! connectivity returns. The operation kind is a closed enum with a typed
//! payload per variant, dispatched by exhaustive match.

use chrono::{DateTime, Local};
use fleetdesk_util::{OperationId, UserId};
use serde::{Deserialize, Serialize};

/// Default bound on replay attempts before an operation is parked as failed
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The four auth-affecting operation kinds that can be queued offline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    /// Sign in with password credentials
    Auth { email: String, password: String },

    /// Update the signed-in user's profile record
    ProfileUpdate {
        user_id: UserId,
        display_name: String,
    },

    /// Renew the current session
    SessionRefresh,

    /// Invalidate the current session
    SignOut,
}

impl OperationKind {
    /// Short tag for logging and stats
    pub fn tag(&self) -> &'static str {
        match self {
            OperationKind::Auth { .. } => "auth",
            OperationKind::ProfileUpdate { .. } => "profile_update",
            OperationKind::SessionRefresh => "session_refresh",
            OperationKind::SignOut => "sign_out",
        }
    }
}

/// A queued auth operation awaiting replay.
///
/// Exists in exactly one of the pending queue or the failed list; it leaves
/// pending exactly when it succeeds or moves to failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub enqueued_at: DateTime<Local>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl OfflineOperation {
    pub fn new(kind: OperationKind, max_retries: u32, enqueued_at: DateTime<Local>) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            enqueued_at,
            retry_count: 0,
            max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_kind_round_trips() {
        let kind = OperationKind::Auth {
            email: "tech@depot.example".into(),
            password: "pw".into(),
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"auth\""));
        let parsed: OperationKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, parsed);
    }

    #[test]
    fn new_operation_starts_unretried() {
        let op = OfflineOperation::new(OperationKind::SignOut, 3, Local::now());
        assert_eq!(op.retry_count, 0);
        assert_eq!(op.max_retries, 3);
        assert_eq!(op.kind.tag(), "sign_out");
    }
}
