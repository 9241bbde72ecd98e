//! Session manager: the authoritative owner of user/session/profile state
//!
//! Orchestrates sign-in, sign-out, refresh, and profile loading; consults
//! the cache layer before calling the backend; reports every outcome to the
//! metrics collector. Initialization never fails the application - network
//! and timeout errors degrade to an anonymous state.

use chrono::{DateTime, Local};
use fleetdesk_api::{
    AuthCheckSource, AuthError, AuthResult, AuthState, ErrorCode, MetricsSummary, Profile,
    Session, UserIdentity,
};
use fleetdesk_backend::AuthBackend;
use fleetdesk_config::AuthConfig;
use fleetdesk_store::PersistedState;
use fleetdesk_util::{MonotonicInstant, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    ActivitySource, AuthCache, CoreEvent, MetricsCollector, RefreshDue, RefreshScheduler,
    SESSION_CACHE_KEY,
};

/// Bound on the initial backend session fetch
pub const SESSION_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the backend sign-out call
pub const SIGN_OUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on a backend profile fetch
pub const PROFILE_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Bound on the remaining backend calls (sign-in, refresh, password ops)
pub const BACKEND_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// The authoritative session/identity state and its orchestration logic.
///
/// Owns the cache layer, metrics collector, and refresh scheduler; no other
/// component mutates those directly.
pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    cache: AuthCache,
    metrics: MetricsCollector,
    scheduler: RefreshScheduler,
    events: mpsc::UnboundedSender<CoreEvent>,

    state: AuthState,
    user: Option<UserIdentity>,
    session: Option<Session>,
    profile: Option<Profile>,
    last_error: Option<AuthError>,
    last_auth_check: Option<DateTime<Local>>,
    auth_check_source: Option<AuthCheckSource>,
    is_initialized: bool,
    is_loading: bool,

    password_redirect_url: String,
}

impl SessionManager {
    /// Create a manager and the channel its refresh timer fires on
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        config: &AuthConfig,
        password_redirect_url: String,
        events: mpsc::UnboundedSender<CoreEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<RefreshDue>) {
        let (scheduler, refresh_rx) = RefreshScheduler::new(config.refresh_fraction);

        let manager = Self {
            backend,
            cache: AuthCache::new(config.session_ttl, config.profile_ttl),
            metrics: MetricsCollector::new(),
            scheduler,
            events,
            state: AuthState::Uninitialized,
            user: None,
            session: None,
            profile: None,
            last_error: None,
            last_auth_check: None,
            auth_check_source: None,
            is_initialized: false,
            is_loading: false,
            password_redirect_url,
        };

        (manager, refresh_rx)
    }

    // --- lifecycle operations ---

    /// Resolve the initial auth state. Idempotent; never propagates errors -
    /// blocking app start on auth is unacceptable, so failures degrade to
    /// `Anonymous` with the error recorded in state.
    pub async fn initialize(&mut self) -> AuthState {
        if self.is_initialized {
            return self.state;
        }

        self.state = AuthState::Initializing;
        self.is_loading = true;
        let started = MonotonicInstant::now();

        // Cheapest first: already-held identity and profile
        if self.user.is_some() && self.profile.is_some() {
            let user_id = self.user.as_ref().map(|u| u.id.clone());
            info!(user_id = ?user_id, "Initialized from held identity");
            self.state = AuthState::Authenticated;
            self.finish_init(AuthCheckSource::Memory, started);
            return self.state;
        }

        // Next: a cached session
        if let Some(session) = self.cache.get_session(SESSION_CACHE_KEY, MonotonicInstant::now()) {
            return self.adopt_session(session, AuthCheckSource::Cache, started).await;
        }

        // Last: ask the backend, bounded so a hung backend cannot hang
        // application start
        match timeout(SESSION_FETCH_TIMEOUT, self.backend.get_session()).await {
            Ok(Ok(Some(session))) => {
                self.cache
                    .put_session(SESSION_CACHE_KEY, session.clone(), MonotonicInstant::now());
                self.adopt_session(session, AuthCheckSource::Backend, started).await
            }
            Ok(Ok(None)) => {
                debug!("No backend session, initializing as anonymous");
                self.state = AuthState::Anonymous;
                self.finish_init(AuthCheckSource::Backend, started);
                self.state
            }
            Ok(Err(e)) => {
                self.degrade_init(AuthError::backend(ErrorCode::InitError, e.to_string()), started)
            }
            Err(_) => self.degrade_init(
                AuthError::timeout(ErrorCode::InitError, "session fetch timed out"),
                started,
            ),
        }
    }

    /// Adopt a session during initialization, resolving its profile
    async fn adopt_session(
        &mut self,
        session: Session,
        source: AuthCheckSource,
        started: MonotonicInstant,
    ) -> AuthState {
        let user_id = session.user.id.clone();
        self.user = Some(session.user.clone());
        self.session = Some(session.clone());

        let profile_held = self.profile.as_ref().is_some_and(|p| p.id == user_id);
        if !profile_held && let Err(err) = self.load_profile(&user_id).await {
            // Initialization completes anyway; drop the half-adopted state
            warn!(user_id = %user_id, error = %err, "Profile unresolved during init");
            self.user = None;
            self.session = None;
            return self.degrade_init(
                AuthError::new(ErrorCode::InitError, err.source, err.message.clone()),
                started,
            );
        }

        self.arm_refresh(session.expires_at);
        self.state = AuthState::Authenticated;
        self.finish_init(source, started);
        info!(user_id = %user_id, source = ?source, "Initialized with session");
        self.state
    }

    fn finish_init(&mut self, source: AuthCheckSource, started: MonotonicInstant) {
        self.last_auth_check = Some(fleetdesk_util::now());
        self.auth_check_source = Some(source);
        self.is_initialized = true;
        self.is_loading = false;
        self.observe_latency(started);
        if let Some(alert) = self.metrics.update_stability(true) {
            self.emit(CoreEvent::Alert(alert));
        }
    }

    /// Absorb an initialization failure: record it, degrade to anonymous
    fn degrade_init(&mut self, error: AuthError, started: MonotonicInstant) -> AuthState {
        warn!(error = %error, "Initialization degraded to anonymous");
        self.note_failure(error);
        self.state = AuthState::Anonymous;
        self.is_initialized = true;
        self.is_loading = false;
        self.observe_latency(started);
        if let Some(alert) = self.metrics.update_stability(false) {
            self.emit(CoreEvent::Alert(alert));
        }
        self.state
    }

    /// Sign in with password credentials.
    ///
    /// If the profile cannot be loaded after a successful backend sign-in,
    /// the entire sign-in is rolled back so the store is never left
    /// authenticated without a profile.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> AuthResult<Profile> {
        let started = MonotonicInstant::now();

        let session = match timeout(
            BACKEND_CALL_TIMEOUT,
            self.backend.sign_in_with_password(email, password),
        )
        .await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                let err = AuthError::backend(ErrorCode::SignInError, e.to_string());
                self.observe_latency(started);
                self.note_failure(err.clone());
                self.state = AuthState::Errored;
                return Err(err);
            }
            Err(_) => {
                let err = AuthError::timeout(ErrorCode::SignInError, "sign-in timed out");
                self.observe_latency(started);
                self.note_failure(err.clone());
                self.state = AuthState::Errored;
                return Err(err);
            }
        };

        let user_id = session.user.id.clone();
        self.user = Some(session.user.clone());
        self.session = Some(session.clone());
        self.cache
            .put_session(SESSION_CACHE_KEY, session.clone(), MonotonicInstant::now());

        match self.load_profile(&user_id).await {
            Ok(profile) => {
                self.state = AuthState::Authenticated;
                self.last_auth_check = Some(fleetdesk_util::now());
                self.auth_check_source = Some(AuthCheckSource::Backend);
                self.arm_refresh(session.expires_at);
                self.observe_latency(started);
                if let Some(alert) = self.metrics.update_stability(true) {
                    self.emit(CoreEvent::Alert(alert));
                }
                self.scheduler
                    .record_activity("signed in".to_string(), ActivitySource::Manager);
                self.emit(CoreEvent::SignedIn {
                    user_id: user_id.clone(),
                });
                info!(user_id = %user_id, "Signed in");
                Ok(profile)
            }
            Err(profile_err) => {
                // Full rollback: no half-authenticated state survives
                warn!(
                    user_id = %user_id,
                    error = %profile_err,
                    "Profile load failed after sign-in, rolling back"
                );
                self.user = None;
                self.session = None;
                self.profile = None;
                self.cache.remove_session(SESSION_CACHE_KEY);
                self.scheduler.clear();
                self.state = AuthState::Errored;

                let err = AuthError::new(
                    ErrorCode::SignInError,
                    profile_err.source,
                    format!("profile load failed during sign-in: {}", profile_err.message),
                );
                self.note_failure(err.clone());
                Err(err)
            }
        }
    }

    /// Sign out. Local session, profile, cache, and metrics are cleared
    /// regardless of the backend outcome - sign-out must never leave stale
    /// credentials resident locally.
    pub async fn sign_out(&mut self) -> AuthResult<()> {
        self.state = AuthState::SigningOut;
        let started = MonotonicInstant::now();

        // The timer must be gone before sign-out completes, or a refresh
        // could fire against a cleared session
        self.scheduler.clear();

        let backend_result = timeout(SIGN_OUT_TIMEOUT, self.backend.sign_out()).await;

        self.user = None;
        self.session = None;
        self.profile = None;
        self.cache.clear();
        self.metrics.reset();
        self.last_auth_check = None;
        self.auth_check_source = None;
        self.state = AuthState::Anonymous;
        self.scheduler
            .record_activity("signed out".to_string(), ActivitySource::Manager);
        self.emit(CoreEvent::SignedOut);

        match backend_result {
            Ok(Ok(())) => {
                self.observe_latency(started);
                info!("Signed out");
                Ok(())
            }
            Ok(Err(e)) => {
                let err = AuthError::backend(ErrorCode::SignOutError, e.to_string());
                self.observe_latency(started);
                self.note_failure(err.clone());
                Err(err)
            }
            Err(_) => {
                let err = AuthError::timeout(ErrorCode::SignOutError, "sign-out timed out");
                self.observe_latency(started);
                self.note_failure(err.clone());
                Err(err)
            }
        }
    }

    /// Renew the session. A transient refresh failure is not a sign-out:
    /// the session is kept, the failure is recorded, and the scheduler will
    /// be re-armed by the next successful refresh.
    pub async fn refresh_session(&mut self) -> AuthResult<Session> {
        if self.session.is_none() {
            return Err(AuthError::internal(
                ErrorCode::RefreshError,
                "no active session to refresh",
            ));
        }

        self.state = AuthState::Refreshing;
        let started = MonotonicInstant::now();

        match timeout(BACKEND_CALL_TIMEOUT, self.backend.refresh_session()).await {
            Ok(Ok(session)) => {
                self.session = Some(session.clone());
                self.user = Some(session.user.clone());
                self.cache
                    .put_session(SESSION_CACHE_KEY, session.clone(), MonotonicInstant::now());
                self.arm_refresh(session.expires_at);
                self.state = AuthState::Authenticated;
                self.last_auth_check = Some(fleetdesk_util::now());
                self.auth_check_source = Some(AuthCheckSource::Backend);
                self.observe_latency(started);
                if let Some(alert) = self.metrics.update_stability(true) {
                    self.emit(CoreEvent::Alert(alert));
                }
                self.scheduler
                    .record_activity("session refreshed".to_string(), ActivitySource::Manager);
                self.emit(CoreEvent::SessionRefreshed {
                    expires_at: session.expires_at,
                });
                debug!(expires_at = %session.expires_at, "Session refreshed");
                Ok(session)
            }
            Ok(Err(e)) => {
                self.observe_latency(started);
                Err(self.refresh_failed(AuthError::backend(ErrorCode::RefreshError, e.to_string())))
            }
            Err(_) => {
                self.observe_latency(started);
                Err(self.refresh_failed(AuthError::timeout(
                    ErrorCode::RefreshError,
                    "refresh timed out",
                )))
            }
        }
    }

    fn refresh_failed(&mut self, err: AuthError) -> AuthError {
        warn!(error = %err, "Session refresh failed, keeping session");
        self.note_failure(err.clone());
        if let Some(alert) = self.metrics.update_stability(false) {
            self.emit(CoreEvent::Alert(alert));
        }
        self.state = AuthState::Errored;
        err
    }

    /// Load a profile, cache-first. Raises on not-found and timeout so
    /// callers (notably `sign_in`) can react.
    pub async fn load_profile(&mut self, user_id: &UserId) -> AuthResult<Profile> {
        self.is_loading = true;
        let started = MonotonicInstant::now();

        if let Some(profile) = self.cache.get_profile(user_id.as_str(), MonotonicInstant::now()) {
            self.profile = Some(profile.clone());
            self.is_loading = false;
            debug!(user_id = %user_id, "Profile resolved from cache");
            return Ok(profile);
        }

        let result = match timeout(
            PROFILE_FETCH_TIMEOUT,
            self.backend.fetch_profile_by_id(user_id),
        )
        .await
        {
            Ok(Ok(Some(profile))) => {
                self.cache
                    .put_profile(user_id.as_str(), profile.clone(), MonotonicInstant::now());
                self.profile = Some(profile.clone());
                self.observe_latency(started);
                Ok(profile)
            }
            Ok(Ok(None)) => Err(AuthError::backend(
                ErrorCode::ProfileLoadError,
                format!("profile not found for {}", user_id),
            )),
            Ok(Err(e)) => Err(AuthError::backend(ErrorCode::ProfileLoadError, e.to_string())),
            Err(_) => Err(AuthError::timeout(
                ErrorCode::ProfileLoadError,
                "profile fetch timed out",
            )),
        };

        if let Err(err) = &result {
            self.note_failure(err.clone());
        }
        self.is_loading = false;
        result
    }

    /// Update the signed-in user's profile record and re-cache it
    pub async fn update_profile(
        &mut self,
        user_id: &UserId,
        display_name: &str,
    ) -> AuthResult<Profile> {
        let started = MonotonicInstant::now();

        match timeout(
            BACKEND_CALL_TIMEOUT,
            self.backend.update_profile(user_id, display_name),
        )
        .await
        {
            Ok(Ok(profile)) => {
                self.cache
                    .put_profile(user_id.as_str(), profile.clone(), MonotonicInstant::now());
                if self.user.as_ref().is_some_and(|u| &u.id == user_id) {
                    self.profile = Some(profile.clone());
                }
                self.observe_latency(started);
                Ok(profile)
            }
            Ok(Err(e)) => {
                let err = AuthError::backend(ErrorCode::ProfileLoadError, e.to_string());
                self.observe_latency(started);
                self.note_failure(err.clone());
                Err(err)
            }
            Err(_) => {
                let err =
                    AuthError::timeout(ErrorCode::ProfileLoadError, "profile update timed out");
                self.observe_latency(started);
                self.note_failure(err.clone());
                Err(err)
            }
        }
    }

    /// Request a password-reset email. Pass-through with metrics only.
    pub async fn reset_password_for_email(&mut self, email: &str) -> AuthResult<()> {
        let started = MonotonicInstant::now();
        let redirect = self.password_redirect_url.clone();

        let result = match timeout(
            BACKEND_CALL_TIMEOUT,
            self.backend.reset_password_for_email(email, &redirect),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AuthError::backend(ErrorCode::PasswordResetError, e.to_string())),
            Err(_) => Err(AuthError::timeout(
                ErrorCode::PasswordResetError,
                "password reset timed out",
            )),
        };

        self.observe_latency(started);
        if let Err(err) = &result {
            self.note_failure(err.clone());
        }
        result
    }

    /// Update the signed-in user's password. Pass-through with metrics only.
    pub async fn update_password(&mut self, new_password: &str) -> AuthResult<()> {
        let started = MonotonicInstant::now();

        let result = match timeout(BACKEND_CALL_TIMEOUT, self.backend.update_password(new_password))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AuthError::backend(ErrorCode::PasswordUpdateError, e.to_string())),
            Err(_) => Err(AuthError::timeout(
                ErrorCode::PasswordUpdateError,
                "password update timed out",
            )),
        };

        self.observe_latency(started);
        if let Err(err) = &result {
            self.note_failure(err.clone());
        }
        result
    }

    // --- maintenance and reporting ---

    /// Evict expired cache entries (driven by the agent's prune interval)
    pub fn prune_cache(&mut self, now: MonotonicInstant) -> usize {
        self.cache.prune(now)
    }

    pub fn metrics_summary(&self) -> MetricsSummary {
        self.metrics.summary(self.cache.hit_rate())
    }

    pub fn cache_lookup_count(&self) -> u64 {
        self.cache.lookup_count()
    }

    /// Count an operation deferred to the offline queue
    pub fn note_offline_enqueued(&mut self, kind: &'static str) {
        self.metrics.record_offline_operation();
        self.scheduler
            .record_activity(format!("queued offline: {}", kind), ActivitySource::Queue);
    }

    /// True if the live session expires within the soon-window
    pub fn is_session_expiring_soon(&self) -> bool {
        self.session.as_ref().is_some_and(|s| {
            self.scheduler
                .is_expiring_soon(s.expires_at, fleetdesk_util::now())
        })
    }

    /// Remaining lifetime of the live session (zero when absent or expired)
    pub fn session_time_remaining(&self) -> Duration {
        self.session
            .as_ref()
            .map(|s| self.scheduler.time_remaining(s.expires_at, fleetdesk_util::now()))
            .unwrap_or(Duration::ZERO)
    }

    pub fn activity_trail(&self) -> Vec<crate::ActivityEntry> {
        self.scheduler.activity().cloned().collect()
    }

    // --- persistence ---

    /// Snapshot the persistable subset of manager state. Session tokens are
    /// excluded; the queue lists are filled in by the store context.
    pub fn snapshot(&self) -> PersistedState {
        let (cache_hits, cache_misses) = self.cache.counters();
        PersistedState {
            user: self.user.clone(),
            profile: self.profile.clone(),
            last_auth_check: self.last_auth_check,
            auth_check_source: self.auth_check_source,
            cache_hits,
            cache_misses,
            pending_operations: Vec::new(),
            failed_operations: Vec::new(),
            saved_at: Some(fleetdesk_util::now()),
        }
    }

    /// Restore the persisted subset on boot (before `initialize`)
    pub fn apply_snapshot(&mut self, snapshot: &PersistedState) {
        self.user = snapshot.user.clone();
        self.profile = snapshot.profile.clone();
        self.last_auth_check = snapshot.last_auth_check;
        self.auth_check_source = snapshot.auth_check_source;
        self.cache
            .restore_counters(snapshot.cache_hits, snapshot.cache_misses);
    }

    // --- accessors ---

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn last_error(&self) -> Option<&AuthError> {
        self.last_error.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    // --- internals ---

    fn arm_refresh(&mut self, expires_at: DateTime<Local>) {
        let fire_in = self.scheduler.schedule(expires_at, fleetdesk_util::now());
        self.emit(CoreEvent::RefreshScheduled { fire_in });
    }

    fn observe_latency(&mut self, started: MonotonicInstant) {
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Some(alert) = self.metrics.record_latency(latency_ms) {
            self.emit(CoreEvent::Alert(alert));
        }
    }

    fn note_failure(&mut self, error: AuthError) {
        if let Some(alert) = self.metrics.record_failed_operation() {
            self.emit(CoreEvent::Alert(alert));
        }
        self.last_error = Some(error);
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.events.send(event);
    }
}
