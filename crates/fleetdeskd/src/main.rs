//! fleetdeskd - The fleetdesk auth agent
//!
//! This is the main entry point for the background agent. It wires together
//! all the components:
//! - Configuration loading
//! - Snapshot store initialization and restore
//! - HTTP identity backend
//! - The auth store context (manager, cache, metrics, scheduler, queue)
//! - Connectivity monitoring
//! - Periodic maintenance (cache prune, health check, snapshot)

use anyhow::{Context, Result};
use clap::Parser;
use fleetdesk_backend_http::{ConnectivityEvent, ConnectivityMonitor, HttpAuthBackend};
use fleetdesk_config::{Config, load_config};
use fleetdesk_core::{AuthStore, AuthStoreChannels, CoreEvent};
use fleetdesk_store::{SqliteStore, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// fleetdeskd - session and identity agent for the fleetdesk dashboard
#[derive(Parser, Debug)]
#[command(name = "fleetdeskd")]
#[command(about = "Session and identity agent for the fleetdesk dashboard", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/fleetdesk/agent.toml")]
    config: PathBuf,

    /// Data directory override (or set FLEETDESK_DATA_DIR env var)
    #[arg(short, long, env = "FLEETDESK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main agent state
struct Agent {
    config: Config,
    auth: AuthStore,
    channels: AuthStoreChannels,
    persistence: Arc<dyn Store>,
    shutdown_tx: watch::Sender<bool>,
    connectivity_events: tokio::sync::mpsc::Receiver<ConnectivityEvent>,
}

impl Agent {
    async fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let mut config = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        if let Some(data_dir) = &args.data_dir {
            config.agent.data_dir = data_dir.clone();
        }

        info!(
            config_path = %args.config.display(),
            backend_url = %config.backend.base_url,
            "Configuration loaded"
        );

        // Create data directory and open the snapshot store
        std::fs::create_dir_all(&config.agent.data_dir).with_context(|| {
            format!("Failed to create data directory {:?}", config.agent.data_dir)
        })?;

        let db_path = config.agent.data_dir.join("fleetdeskd.db");
        let persistence: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        // Initialize the HTTP backend
        let backend = Arc::new(
            HttpAuthBackend::new(&config.backend).context("Failed to create HTTP backend")?,
        );

        // The auth store context
        let redirect_url = format!("{}/reset-password", config.backend.base_url);
        let (auth, channels) = AuthStore::new(backend, &config.auth, redirect_url);

        // Restore the persisted subset before initializing
        match persistence.load_snapshot() {
            Ok(Some(snapshot)) => auth.restore(&snapshot).await,
            Ok(None) => debug!("No snapshot to restore"),
            Err(e) => warn!(error = %e, "Snapshot restore failed, starting fresh"),
        }

        // Connectivity monitor
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (monitor, connectivity_events) =
            ConnectivityMonitor::new(config.connectivity.clone(), shutdown_rx);
        tokio::spawn(monitor.run());

        Ok(Self {
            config,
            auth,
            channels,
            persistence,
            shutdown_tx,
            connectivity_events,
        })
    }

    async fn run(mut self) -> Result<()> {
        // Resolve the initial auth state; this never fails the agent
        let state = self.auth.initialize().await;
        info!(state = ?state, "Auth store initialized");

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        // Maintenance timers
        let mut prune_timer = tokio::time::interval(self.config.agent.prune_interval);
        let mut health_timer = tokio::time::interval(self.config.agent.health_interval);
        let mut snapshot_timer = tokio::time::interval(self.config.agent.snapshot_interval);
        prune_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        health_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        snapshot_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("Agent running");

        loop {
            tokio::select! {
                // Graceful shutdown on SIGTERM or SIGINT
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // The proactive refresh timer fired
                Some(_) = self.channels.refresh_due.recv() => {
                    debug!("Refresh timer fired");
                    match self.auth.refresh_session().await {
                        Ok(_) => {}
                        Err(e) => {
                            // A transient refresh failure is not a sign-out;
                            // the session remains valid until actual expiry
                            warn!(error = %e, "Scheduled refresh failed");
                        }
                    }
                }

                // Connectivity transitions drive the offline queue
                Some(event) = self.connectivity_events.recv() => {
                    let ConnectivityEvent::StatusChanged { connected, .. } = event;
                    self.auth.set_online_status(connected).await;
                }

                // Store events - logged for observability
                Some(event) = self.channels.events.recv() => {
                    Self::log_core_event(&event);
                }

                // Cache prune interval
                _ = prune_timer.tick() => {
                    let evicted = self.auth.run_prune().await;
                    if evicted > 0 {
                        debug!(evicted, "Cache pruned");
                    }
                }

                // Health evaluation interval
                _ = health_timer.tick() => {
                    let report = self.auth.health_check().await;
                    if report.is_healthy {
                        debug!(
                            stability = report.metrics.session_stability,
                            avg_latency_ms = report.metrics.average_auth_latency_ms,
                            "Health check passed"
                        );
                    } else {
                        warn!(issues = ?report.issues, "Health check failed");
                    }
                }

                // Periodic snapshot
                _ = snapshot_timer.tick() => {
                    self.save_snapshot().await;
                }
            }
        }

        // Graceful shutdown: stop the connectivity monitor and persist state
        let _ = self.shutdown_tx.send(true);
        self.save_snapshot().await;
        info!("Shutdown complete");
        Ok(())
    }

    async fn save_snapshot(&self) {
        let snapshot = self.auth.snapshot().await;
        if let Err(e) = self.persistence.save_snapshot(&snapshot) {
            error!(error = %e, "Failed to save snapshot");
        }
    }

    fn log_core_event(event: &CoreEvent) {
        match event {
            CoreEvent::SignedIn { user_id } => info!(user_id = %user_id, "User signed in"),
            CoreEvent::SignedOut => info!("User signed out"),
            CoreEvent::SessionRefreshed { expires_at } => {
                debug!(expires_at = %expires_at, "Session refreshed")
            }
            CoreEvent::RefreshScheduled { fire_in } => {
                debug!(fire_in_secs = fire_in.as_secs(), "Refresh scheduled")
            }
            CoreEvent::ConnectivityChanged { online } => {
                info!(online, "Connectivity changed")
            }
            CoreEvent::QueueDrained { processed, parked } => {
                info!(processed, parked, "Offline queue drained")
            }
            CoreEvent::OperationParked { id, kind } => {
                warn!(operation_id = %id, kind, "Offline operation exhausted retries")
            }
            CoreEvent::Alert(alert) => warn!(alert = ?alert, "Metrics alert"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "fleetdeskd starting");

    // Create and run the agent
    let agent = Agent::new(&args).await?;
    agent.run().await
}
