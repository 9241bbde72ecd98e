//! Proactive token refresh scheduling
//!
//! A session is renewed at a fraction (default 75%) of its remaining
//! lifetime rather than reactively after expiry. At most one refresh timer
//! is ever armed: arming cancels any previous timer, which is the invariant
//! preventing duplicate concurrent refreshes.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// A session within this window of expiry is "expiring soon" for UI purposes
pub const EXPIRING_SOON_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Bound on the diagnostic activity trail (oldest evicted first)
pub const MAX_ACTIVITY_ENTRIES: usize = 50;

/// Sent on the scheduler channel when the armed timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshDue;

/// Which component recorded an activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    Scheduler,
    Manager,
    Queue,
}

/// One diagnostic trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Local>,
    pub action: String,
    pub source: ActivitySource,
}

/// Owns the single refresh timer and the bounded activity trail.
///
/// The timer is a spawned sleep task holding only the channel sender; the
/// handle stays here so cancel-on-replace is a plain `abort()`.
pub struct RefreshScheduler {
    refresh_fraction: f64,
    tx: mpsc::UnboundedSender<RefreshDue>,
    timer: Option<JoinHandle<()>>,
    activity: VecDeque<ActivityEntry>,
}

impl RefreshScheduler {
    /// Create a scheduler and the channel its timer fires on
    pub fn new(refresh_fraction: f64) -> (Self, mpsc::UnboundedReceiver<RefreshDue>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                refresh_fraction,
                tx,
                timer: None,
                activity: VecDeque::new(),
            },
            rx,
        )
    }

    /// Arm the refresh timer for a session expiring at `expires_at`.
    ///
    /// Cancels any previously armed timer first. Returns the delay the timer
    /// was armed with.
    pub fn schedule(&mut self, expires_at: DateTime<Local>, now: DateTime<Local>) -> Duration {
        self.clear();

        let remaining = (expires_at - now).num_milliseconds().max(0) as u64;
        let delay = Duration::from_millis(
            (remaining as f64 * self.refresh_fraction).round() as u64,
        );

        let tx = self.tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RefreshDue);
        }));

        debug!(delay_ms = delay.as_millis() as u64, "Refresh timer armed");
        self.record_activity(
            format!("refresh timer armed ({}ms)", delay.as_millis()),
            ActivitySource::Scheduler,
        );

        delay
    }

    /// Cancel the armed timer, if any. Idempotent; must run before sign-out
    /// completes or a refresh could fire against a cleared session.
    pub fn clear(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!("Refresh timer cancelled");
            self.record_activity("refresh timer cancelled".to_string(), ActivitySource::Scheduler);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// True if the session expires within the soon-window
    pub fn is_expiring_soon(&self, expires_at: DateTime<Local>, now: DateTime<Local>) -> bool {
        self.time_remaining(expires_at, now) <= EXPIRING_SOON_WINDOW
    }

    /// Remaining session lifetime, zero if already expired (for UI countdowns)
    pub fn time_remaining(&self, expires_at: DateTime<Local>, now: DateTime<Local>) -> Duration {
        Duration::from_millis((expires_at - now).num_milliseconds().max(0) as u64)
    }

    /// Append a diagnostic trail entry, evicting the oldest beyond the bound
    pub fn record_activity(&mut self, action: String, source: ActivitySource) {
        if self.activity.len() == MAX_ACTIVITY_ENTRIES {
            self.activity.pop_front();
        }
        self.activity.push_back(ActivityEntry {
            timestamp: fleetdesk_util::now(),
            action,
            source,
        });
    }

    pub fn activity(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.activity.iter()
    }

    pub fn activity_len(&self) -> usize {
        self.activity.len()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
