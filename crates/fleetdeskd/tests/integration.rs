//! Integration tests for the fleetdesk auth agent
//!
//! These tests verify the end-to-end behavior of the store context against
//! the mock backend and the real SQLite snapshot store.

use fleetdesk_api::{AuthState, QueueStats};
use fleetdesk_backend::MockBackend;
use fleetdesk_config::AuthConfig;
use fleetdesk_core::{AuthStore, AuthStoreChannels, Dispatch};
use fleetdesk_store::{SqliteStore, Store};
use fleetdesk_util::UserId;
use std::sync::Arc;
use std::time::Duration;

fn make_store(backend: Arc<MockBackend>) -> (AuthStore, AuthStoreChannels) {
    AuthStore::new(
        backend,
        &AuthConfig::default(),
        "https://fleetdesk.example/reset-password".into(),
    )
}

#[tokio::test]
async fn sign_in_survives_restart_via_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("fleetdeskd.db");

    // First run: sign in and persist
    {
        let backend = Arc::new(MockBackend::new());
        let (auth, _channels) = make_store(backend);

        auth.initialize().await;
        auth.sign_in("dana@depot.example", "pw").await.unwrap();

        let persistence = SqliteStore::open(&db_path).unwrap();
        persistence.save_snapshot(&auth.snapshot().await).unwrap();
    }

    // Second run: restore and initialize without backend traffic
    {
        let backend = Arc::new(MockBackend::new());
        let (auth, _channels) = make_store(backend.clone());

        let persistence = SqliteStore::open(&db_path).unwrap();
        let snapshot = persistence.load_snapshot().unwrap().unwrap();
        auth.restore(&snapshot).await;

        let state = auth.initialize().await;
        assert_eq!(state, AuthState::Authenticated);
        assert_eq!(backend.sign_in_calls(), 0);
        assert_eq!(backend.profile_calls(), 0);
        assert_eq!(
            auth.profile().await.unwrap().display_name,
            "dana".to_string()
        );
    }
}

#[tokio::test]
async fn offline_queue_survives_restart_and_replays() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("fleetdeskd.db");

    // First run: queue a sign-in while offline, then persist
    {
        let backend = Arc::new(MockBackend::new());
        let (auth, _channels) = make_store(backend.clone());

        auth.set_online_status(false).await;
        let outcome = auth.sign_in("dana@depot.example", "pw").await.unwrap();
        assert!(matches!(outcome, Dispatch::Queued(_)));
        assert_eq!(backend.sign_in_calls(), 0);

        let persistence = SqliteStore::open(&db_path).unwrap();
        persistence.save_snapshot(&auth.snapshot().await).unwrap();
    }

    // Second run: the queued operation replays once connectivity returns
    {
        let backend = Arc::new(MockBackend::new());
        let (auth, _channels) = make_store(backend.clone());

        let persistence = SqliteStore::open(&db_path).unwrap();
        let snapshot = persistence.load_snapshot().unwrap().unwrap();
        auth.restore(&snapshot).await;
        assert_eq!(auth.queue_stats().await.pending, 1);

        auth.process_queue().await;

        assert_eq!(backend.sign_in_calls(), 1);
        assert_eq!(
            auth.queue_stats().await,
            QueueStats {
                pending: 0,
                failed: 0,
                total: 0
            }
        );
        assert_eq!(auth.state().await, AuthState::Authenticated);
    }
}

#[tokio::test(start_paused = true)]
async fn reconnect_settle_delay_triggers_drain() {
    let backend = Arc::new(MockBackend::new());
    let (auth, _channels) = make_store(backend.clone());

    auth.set_online_status(false).await;
    auth.sign_in("dana@depot.example", "pw").await.unwrap();
    auth.set_online_status(true).await;

    // Drain has not started before the settle delay elapses
    assert_eq!(backend.sign_in_calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.sign_in_calls(), 1);
    assert_eq!(auth.queue_stats().await.pending, 0);
}

#[tokio::test]
async fn failed_operations_are_visible_not_disruptive() {
    let backend = Arc::new(MockBackend::new());
    let (auth, _channels) = make_store(backend);

    auth.set_online_status(false).await;
    // Targets a user the backend does not know; every replay fails
    auth.update_profile(&UserId::new("ghost"), "Nobody")
        .await
        .unwrap();

    auth.set_online_status(true).await;
    for _ in 0..3 {
        auth.process_queue().await;
    }

    let stats = auth.queue_stats().await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 0);

    // The store remains usable throughout
    assert_eq!(auth.state().await, AuthState::Uninitialized);
    let outcome = auth.sign_in("dana@depot.example", "pw").await.unwrap();
    assert!(matches!(outcome, Dispatch::Completed(_)));
}

#[tokio::test]
async fn health_surface_reports_metrics() {
    let backend = Arc::new(MockBackend::new());
    let (auth, _channels) = make_store(backend);

    auth.initialize().await;
    auth.sign_in("dana@depot.example", "pw").await.unwrap();

    let report = auth.health_check().await;
    assert!(report.is_healthy);
    assert!(report.metrics.session_stability > 95.0);

    let summary = auth.metrics_summary().await;
    assert!(summary.last_update <= fleetdesk_util::now());
}
