//! Events emitted by the auth store

use crate::MetricsAlert;
use chrono::{DateTime, Local};
use fleetdesk_util::{OperationId, UserId};
use std::time::Duration;

/// Events emitted by the store for external observers (the agent loop, UI)
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A user signed in and their profile resolved
    SignedIn { user_id: UserId },

    /// Local auth state was cleared
    SignedOut,

    /// The session was renewed
    SessionRefreshed { expires_at: DateTime<Local> },

    /// A proactive refresh timer was armed
    RefreshScheduled { fire_in: Duration },

    /// Connectivity status changed
    ConnectivityChanged { online: bool },

    /// An offline-queue drain finished
    QueueDrained { processed: usize, parked: usize },

    /// An operation exhausted its retries and moved to the failed list
    OperationParked { id: OperationId, kind: &'static str },

    /// A metrics warning signal
    Alert(MetricsAlert),
}
