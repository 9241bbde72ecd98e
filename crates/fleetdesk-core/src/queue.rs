//! Offline operation queue
//!
//! Buffers auth-affecting operations requested while the network is
//! unavailable and replays them strictly in enqueue order when connectivity
//! returns. Retries are bounded-count and immediate-on-next-drain rather
//! than backed off: drains are already gated by real connectivity
//! transitions, not a timer loop.

use chrono::{DateTime, Local};
use fleetdesk_api::{OfflineOperation, OperationKind, QueueStats};
use fleetdesk_util::OperationId;
use tracing::{debug, info};

/// Result of recording a replay failure for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Retries remain; the operation stays pending for the next drain
    Retained,

    /// Retries exhausted; the operation moved to the terminal failed list
    MovedToFailed,
}

/// FIFO queue of offline operations with bounded per-operation retries.
///
/// An operation exists in at most one of {pending, failed}; it leaves
/// pending exactly when it succeeds or moves to failed.
#[derive(Debug)]
pub struct OfflineQueue {
    pending: Vec<OfflineOperation>,
    failed: Vec<OfflineOperation>,
    is_syncing: bool,
    is_online: bool,
    default_max_retries: u32,
}

impl OfflineQueue {
    pub fn new(default_max_retries: u32) -> Self {
        Self {
            pending: Vec::new(),
            failed: Vec::new(),
            is_syncing: false,
            is_online: true,
            default_max_retries,
        }
    }

    /// Append an operation with the default retry bound. Never blocks.
    pub fn enqueue(&mut self, kind: OperationKind, now: DateTime<Local>) -> OperationId {
        self.enqueue_with_retries(kind, self.default_max_retries, now)
    }

    /// Append an operation with an explicit retry bound
    pub fn enqueue_with_retries(
        &mut self,
        kind: OperationKind,
        max_retries: u32,
        now: DateTime<Local>,
    ) -> OperationId {
        let op = OfflineOperation::new(kind, max_retries, now);
        let id = op.id;
        info!(operation_id = %id, kind = op.kind.tag(), "Offline operation enqueued");
        self.pending.push(op);
        id
    }

    /// Record the connectivity status. Returns true on the offline-to-online
    /// transition, which is the caller's cue to schedule a drain.
    pub fn set_online(&mut self, online: bool) -> bool {
        let was_online = self.is_online;
        self.is_online = online;
        !was_online && online
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    /// Try to start a drain. Returns false if one is already running, the
    /// network is offline, or there is nothing to do - the single
    /// `is_syncing` flag guards against overlapping drains triggered by
    /// rapid online/offline flapping.
    pub fn begin_drain(&mut self) -> bool {
        if self.is_syncing || !self.is_online || self.pending.is_empty() {
            return false;
        }
        self.is_syncing = true;
        debug!(pending = self.pending.len(), "Queue drain started");
        true
    }

    /// Mark the running drain finished
    pub fn finish_drain(&mut self) {
        self.is_syncing = false;
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing
    }

    /// Snapshot of the pending list in enqueue order
    pub fn pending_ops(&self) -> Vec<OfflineOperation> {
        self.pending.clone()
    }

    /// Remove a successfully replayed operation from pending
    pub fn complete(&mut self, id: OperationId) {
        self.pending.retain(|op| op.id != id);
    }

    /// Record a replay failure. The operation moves to the failed list
    /// exactly when its retry count reaches its bound; otherwise it stays
    /// pending for the next drain cycle.
    pub fn fail(&mut self, id: OperationId) -> Option<FailOutcome> {
        let index = self.pending.iter().position(|op| op.id == id)?;

        let op = &mut self.pending[index];
        op.retry_count += 1;

        if op.retry_count >= op.max_retries {
            let op = self.pending.remove(index);
            info!(
                operation_id = %op.id,
                kind = op.kind.tag(),
                retries = op.retry_count,
                "Operation exhausted retries, parking as failed"
            );
            self.failed.push(op);
            Some(FailOutcome::MovedToFailed)
        } else {
            debug!(
                operation_id = %id,
                retries = self.pending[index].retry_count,
                "Operation failed, will retry on next drain"
            );
            Some(FailOutcome::Retained)
        }
    }

    /// Read-only stats for diagnostics and UI
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.pending.len(),
            failed: self.failed.len(),
            total: self.pending.len() + self.failed.len(),
        }
    }

    pub fn failed_ops(&self) -> &[OfflineOperation] {
        &self.failed
    }

    /// Restore persisted lists on boot
    pub fn restore(&mut self, pending: Vec<OfflineOperation>, failed: Vec<OfflineOperation>) {
        self.pending = pending;
        self.failed = failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_op() -> OperationKind {
        OperationKind::Auth {
            email: "a@x.com".into(),
            password: "p".into(),
        }
    }

    #[test]
    fn enqueue_preserves_order() {
        let mut queue = OfflineQueue::new(3);
        let now = fleetdesk_util::now();

        let a = queue.enqueue(auth_op(), now);
        let b = queue.enqueue(OperationKind::SessionRefresh, now);
        let c = queue.enqueue(OperationKind::SignOut, now);

        let ops: Vec<_> = queue.pending_ops().iter().map(|op| op.id).collect();
        assert_eq!(ops, vec![a, b, c]);
    }

    #[test]
    fn bounded_retry_moves_to_failed() {
        let mut queue = OfflineQueue::new(3);
        let now = fleetdesk_util::now();

        let a = queue.enqueue_with_retries(auth_op(), 2, now);
        let b = queue.enqueue(OperationKind::SessionRefresh, now);

        // First failure: retained
        assert_eq!(queue.fail(a), Some(FailOutcome::Retained));
        assert_eq!(queue.stats().pending, 2);

        // Second failure: retry bound reached, parked as failed
        assert_eq!(queue.fail(a), Some(FailOutcome::MovedToFailed));
        assert_eq!(queue.stats(), QueueStats { pending: 1, failed: 1, total: 2 });

        // A is never retried again; a third fail call finds nothing
        assert_eq!(queue.fail(a), None);

        // B is still pending, in original position
        assert_eq!(queue.pending_ops()[0].id, b);
    }

    #[test]
    fn drain_guard_blocks_overlap() {
        let mut queue = OfflineQueue::new(3);
        let now = fleetdesk_util::now();
        queue.enqueue(auth_op(), now);

        assert!(queue.begin_drain());
        // Second drain attempt while syncing is a no-op
        assert!(!queue.begin_drain());

        queue.finish_drain();
        assert!(queue.begin_drain());
    }

    #[test]
    fn drain_refused_when_offline_or_empty() {
        let mut queue = OfflineQueue::new(3);
        let now = fleetdesk_util::now();

        // Empty queue
        assert!(!queue.begin_drain());

        queue.enqueue(auth_op(), now);
        queue.set_online(false);
        assert!(!queue.begin_drain());

        queue.set_online(true);
        assert!(queue.begin_drain());
    }

    #[test]
    fn online_transition_detection() {
        let mut queue = OfflineQueue::new(3);

        // Already online: no transition
        assert!(!queue.set_online(true));

        assert!(!queue.set_online(false));
        // Offline -> online is the drain cue
        assert!(queue.set_online(true));
    }

    #[test]
    fn complete_removes_from_pending() {
        let mut queue = OfflineQueue::new(3);
        let now = fleetdesk_util::now();

        let a = queue.enqueue(auth_op(), now);
        queue.complete(a);

        assert_eq!(queue.stats(), QueueStats { pending: 0, failed: 0, total: 0 });
    }

    #[test]
    fn restore_rebuilds_lists() {
        let mut queue = OfflineQueue::new(3);
        let now = fleetdesk_util::now();

        let pending = vec![OfflineOperation::new(auth_op(), 3, now)];
        let failed = vec![OfflineOperation::new(OperationKind::SignOut, 3, now)];
        queue.restore(pending, failed);

        assert_eq!(queue.stats(), QueueStats { pending: 1, failed: 1, total: 2 });
    }
}
