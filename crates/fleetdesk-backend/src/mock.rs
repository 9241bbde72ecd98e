//! Mock identity backend for testing

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use fleetdesk_api::{Profile, Session, UserIdentity, UserRole};
use fleetdesk_util::UserId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{AuthBackend, BackendError, BackendResult};

/// Mock identity backend for unit/integration testing.
///
/// Failure injection follows the adapter-mock pattern: each operation has a
/// toggle, and an optional artificial delay exercises the caller's timeout
/// paths. Call counters let tests assert exactly-once dispatch.
pub struct MockBackend {
    session_lifetime: ChronoDuration,
    current: Mutex<Option<Session>>,
    profiles: Mutex<HashMap<UserId, Profile>>,

    /// Configure sign-in to fail with invalid credentials
    pub fail_sign_in: Arc<Mutex<bool>>,

    /// Configure refresh to fail
    pub fail_refresh: Arc<Mutex<bool>>,

    /// Configure sign-out to fail
    pub fail_sign_out: Arc<Mutex<bool>>,

    /// Configure profile fetch to fail (network error)
    pub fail_profile_fetch: Arc<Mutex<bool>>,

    /// Configure password operations to fail
    pub fail_password_ops: Arc<Mutex<bool>>,

    /// Artificial delay applied to every call (simulates a hung backend)
    pub response_delay: Arc<Mutex<Option<Duration>>>,

    sign_in_calls: AtomicU64,
    get_session_calls: AtomicU64,
    refresh_calls: AtomicU64,
    sign_out_calls: AtomicU64,
    profile_calls: AtomicU64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            session_lifetime: ChronoDuration::hours(1),
            current: Mutex::new(None),
            profiles: Mutex::new(HashMap::new()),
            fail_sign_in: Arc::new(Mutex::new(false)),
            fail_refresh: Arc::new(Mutex::new(false)),
            fail_sign_out: Arc::new(Mutex::new(false)),
            fail_profile_fetch: Arc::new(Mutex::new(false)),
            fail_password_ops: Arc::new(Mutex::new(false)),
            response_delay: Arc::new(Mutex::new(None)),
            sign_in_calls: AtomicU64::new(0),
            get_session_calls: AtomicU64::new(0),
            refresh_calls: AtomicU64::new(0),
            sign_out_calls: AtomicU64::new(0),
            profile_calls: AtomicU64::new(0),
        }
    }

    pub fn with_session_lifetime(mut self, lifetime: ChronoDuration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// Seed an existing backend-side session (exercises session reuse paths)
    pub fn seed_session(&self, session: Session) {
        *self.current.lock().unwrap() = Some(session);
    }

    /// Seed a profile record
    pub fn seed_profile(&self, profile: Profile) {
        self.profiles.lock().unwrap().insert(profile.id.clone(), profile);
    }

    /// Remove a profile record (exercises profile-not-found paths)
    pub fn remove_profile(&self, user_id: &UserId) {
        self.profiles.lock().unwrap().remove(user_id);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.response_delay.lock().unwrap() = delay;
    }

    pub fn sign_in_calls(&self) -> u64 {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> u64 {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> u64 {
        self.profile_calls.load(Ordering::SeqCst)
    }

    /// Mint a session for the given email, valid for the configured lifetime
    pub fn mint_session(&self, email: &str) -> Session {
        let user_id = UserId::new(format!("user-{}", email.replace('@', "-at-")));
        Session {
            access_token: format!("access-{}", self.sign_in_calls.load(Ordering::SeqCst)),
            refresh_token: format!("refresh-{}", self.sign_in_calls.load(Ordering::SeqCst)),
            expires_at: fleetdesk_util::now() + self.session_lifetime,
            user: UserIdentity {
                id: user_id,
                email: email.to_string(),
            },
        }
    }

    async fn apply_delay(&self) {
        let delay = *self.response_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> BackendResult<Session> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if *self.fail_sign_in.lock().unwrap() {
            return Err(BackendError::InvalidCredentials);
        }

        let session = self.mint_session(email);

        // Auto-seed a profile for the signed-in user unless tests removed it
        {
            let mut profiles = self.profiles.lock().unwrap();
            profiles.entry(session.user.id.clone()).or_insert_with(|| Profile {
                id: session.user.id.clone(),
                display_name: email.split('@').next().unwrap_or(email).to_string(),
                role: UserRole::Technician,
                organizations: vec![],
                updated_at: fleetdesk_util::now(),
            });
        }

        *self.current.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        Ok(self.current.lock().unwrap().clone())
    }

    async fn refresh_session(&self) -> BackendResult<Session> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if *self.fail_refresh.lock().unwrap() {
            return Err(BackendError::Network("mock refresh failure".into()));
        }

        let mut current = self.current.lock().unwrap();
        let session = current.as_ref().ok_or(BackendError::NoSession)?;

        let refreshed = Session {
            access_token: format!("{}-r", session.access_token),
            refresh_token: format!("{}-r", session.refresh_token),
            expires_at: fleetdesk_util::now() + self.session_lifetime,
            user: session.user.clone(),
        };
        *current = Some(refreshed.clone());
        Ok(refreshed)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if *self.fail_sign_out.lock().unwrap() {
            return Err(BackendError::Network("mock sign-out failure".into()));
        }

        *self.current.lock().unwrap() = None;
        Ok(())
    }

    async fn fetch_profile_by_id(&self, user_id: &UserId) -> BackendResult<Option<Profile>> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if *self.fail_profile_fetch.lock().unwrap() {
            return Err(BackendError::Network("mock profile fetch failure".into()));
        }

        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn reset_password_for_email(
        &self,
        _email: &str,
        _redirect_url: &str,
    ) -> BackendResult<()> {
        self.apply_delay().await;

        if *self.fail_password_ops.lock().unwrap() {
            return Err(BackendError::Rejected("mock password reset failure".into()));
        }
        Ok(())
    }

    async fn update_password(&self, _new_password: &str) -> BackendResult<()> {
        self.apply_delay().await;

        if *self.fail_password_ops.lock().unwrap() {
            return Err(BackendError::Rejected("mock password update failure".into()));
        }

        if self.current.lock().unwrap().is_none() {
            return Err(BackendError::NoSession);
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        display_name: &str,
    ) -> BackendResult<Profile> {
        self.apply_delay().await;

        if *self.fail_profile_fetch.lock().unwrap() {
            return Err(BackendError::Network("mock profile update failure".into()));
        }

        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| BackendError::ProfileNotFound(user_id.clone()))?;
        profile.display_name = display_name.to_string();
        profile.updated_at = fleetdesk_util::now();
        Ok(profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_sign_in_and_session() {
        let backend = MockBackend::new();

        let session = backend
            .sign_in_with_password("tech@depot.example", "pw")
            .await
            .unwrap();
        assert_eq!(session.user.email, "tech@depot.example");

        let current = backend.get_session().await.unwrap();
        assert_eq!(current, Some(session));
        assert_eq!(backend.sign_in_calls(), 1);
    }

    #[tokio::test]
    async fn mock_sign_in_failure() {
        let backend = MockBackend::new();
        *backend.fail_sign_in.lock().unwrap() = true;

        let result = backend.sign_in_with_password("tech@depot.example", "pw").await;
        assert!(matches!(result, Err(BackendError::InvalidCredentials)));
        assert!(backend.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mock_refresh_extends_session() {
        let backend = MockBackend::new();
        backend
            .sign_in_with_password("tech@depot.example", "pw")
            .await
            .unwrap();

        let refreshed = backend.refresh_session().await.unwrap();
        assert!(refreshed.access_token.ends_with("-r"));
        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn mock_refresh_without_session() {
        let backend = MockBackend::new();
        let result = backend.refresh_session().await;
        assert!(matches!(result, Err(BackendError::NoSession)));
    }

    #[tokio::test]
    async fn mock_profile_auto_seeded() {
        let backend = MockBackend::new();
        let session = backend
            .sign_in_with_password("dana@depot.example", "pw")
            .await
            .unwrap();

        let profile = backend
            .fetch_profile_by_id(&session.user.id)
            .await
            .unwrap()
            .expect("profile should be seeded");
        assert_eq!(profile.display_name, "dana");
    }
}
