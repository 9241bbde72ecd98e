//! Network connectivity monitoring
//!
//! Periodic reachability checks against a configurable URL. Status-change
//! events drive the auth store's online/offline transitions (and therefore
//! the offline queue's drain scheduling).

use chrono::{DateTime, Local};
use fleetdesk_config::ConnectivityConfig;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info};

/// Events emitted by the connectivity monitor
#[derive(Debug, Clone)]
pub enum ConnectivityEvent {
    /// Global connectivity status changed
    StatusChanged { connected: bool, check_url: String },
}

/// Cached connectivity check result
#[derive(Debug, Clone)]
struct CheckResult {
    connected: bool,
    checked_at: DateTime<Local>,
}

/// Connectivity monitor that tracks network availability
pub struct ConnectivityMonitor {
    /// HTTP client for connectivity checks
    client: Client,
    /// Configuration
    config: ConnectivityConfig,
    /// Current global connectivity status
    status: Arc<RwLock<Option<CheckResult>>>,
    /// Channel for sending events
    event_tx: mpsc::Sender<ConnectivityEvent>,
    /// Shutdown signal
    shutdown_rx: watch::Receiver<bool>,
}

impl ConnectivityMonitor {
    /// Create a new connectivity monitor
    pub fn new(
        config: ConnectivityConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, mpsc::Receiver<ConnectivityEvent>) {
        let (event_tx, event_rx) = mpsc::channel(32);

        let client = Client::builder()
            .timeout(config.check_timeout)
            .connect_timeout(config.check_timeout)
            .build()
            .expect("Failed to create HTTP client");

        let monitor = Self {
            client,
            config,
            status: Arc::new(RwLock::new(None)),
            event_tx,
            shutdown_rx,
        };

        (monitor, event_rx)
    }

    /// Start the connectivity monitor (runs until shutdown)
    pub async fn run(self) {
        let check_url = self.config.check_url.clone();
        let check_timeout = self.config.check_timeout;
        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut shutdown = self.shutdown_rx.clone();

        // Do initial check immediately
        let connected = check_url_reachable(&self.client, &check_url, check_timeout).await;
        update_status(&self.status, &self.event_tx, &check_url, connected).await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let connected =
                        check_url_reachable(&self.client, &check_url, check_timeout).await;
                    update_status(&self.status, &self.event_tx, &check_url, connected).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("Connectivity monitor shutting down");
                        break;
                    }
                }
            }
        }

        info!("Connectivity monitor stopped");
    }

    /// Get the current global connectivity status
    pub async fn is_connected(&self) -> bool {
        self.status.read().await.as_ref().is_some_and(|r| r.connected)
    }

    /// Get the last check time
    pub async fn last_check_time(&self) -> Option<DateTime<Local>> {
        self.status.read().await.as_ref().map(|r| r.checked_at)
    }

    /// Force an immediate connectivity recheck
    pub async fn trigger_recheck(&self) {
        let connected = check_url_reachable(
            &self.client,
            &self.config.check_url,
            self.config.check_timeout,
        )
        .await;
        update_status(&self.status, &self.event_tx, &self.config.check_url, connected).await;
    }
}

/// Check if a URL is reachable
async fn check_url_reachable(client: &Client, url: &str, timeout: Duration) -> bool {
    debug!(url = %url, "Checking connectivity");

    match client.get(url).timeout(timeout).send().await {
        Ok(response) => {
            let status = response.status();
            let connected = status.is_success() || status.as_u16() == 204;
            debug!(url = %url, status = %status, connected, "Connectivity check complete");
            connected
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Connectivity check failed");
            false
        }
    }
}

/// Update status and emit event if changed
async fn update_status(
    status: &Arc<RwLock<Option<CheckResult>>>,
    event_tx: &mpsc::Sender<ConnectivityEvent>,
    check_url: &str,
    connected: bool,
) {
    let mut status = status.write().await;
    let previous = status.as_ref().map(|r| r.connected);

    *status = Some(CheckResult {
        connected,
        checked_at: fleetdesk_util::now(),
    });

    // Emit event only on transitions
    if previous != Some(connected) {
        info!(
            connected,
            url = %check_url,
            "Connectivity status changed"
        );
        let _ = event_tx
            .send(ConnectivityEvent::StatusChanged {
                connected,
                check_url: check_url.to_string(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> ConnectivityConfig {
        ConnectivityConfig {
            check_url: "https://identity.fleetdesk.example/health".into(),
            check_interval: Duration::from_secs(30),
            check_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn status_starts_unknown() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (monitor, _events) = ConnectivityMonitor::new(make_config(), shutdown_rx);

        assert!(!monitor.is_connected().await);
        assert!(monitor.last_check_time().await.is_none());
    }

    #[tokio::test]
    async fn update_emits_only_on_transition() {
        let status = Arc::new(RwLock::new(None));
        let (tx, mut rx) = mpsc::channel(8);
        let url = "https://identity.fleetdesk.example/health";

        // Unknown -> connected: event
        update_status(&status, &tx, url, true).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(ConnectivityEvent::StatusChanged { connected: true, .. })
        ));

        // Connected -> connected: no event
        update_status(&status, &tx, url, true).await;
        assert!(rx.try_recv().is_err());

        // Connected -> disconnected: event
        update_status(&status, &tx, url, false).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(ConnectivityEvent::StatusChanged { connected: false, .. })
        ));
    }
}
