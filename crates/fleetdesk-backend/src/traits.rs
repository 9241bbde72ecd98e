//! Identity backend trait

use async_trait::async_trait;
use fleetdesk_api::{Profile, Session};
use fleetdesk_util::UserId;
use thiserror::Error;

/// Errors from backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No active session")]
    NoSession,

    #[error("Profile not found: {0}")]
    ProfileNotFound(UserId),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend rejected request: {0}")]
    Rejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Identity backend trait - implemented by protocol-specific adapters
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a session
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> BackendResult<Session>;

    /// Fetch the backend's current session, if any
    async fn get_session(&self) -> BackendResult<Option<Session>>;

    /// Renew the current session using its refresh token
    async fn refresh_session(&self) -> BackendResult<Session>;

    /// Invalidate the current session
    async fn sign_out(&self) -> BackendResult<()>;

    /// Fetch a user profile record by id
    async fn fetch_profile_by_id(&self, user_id: &UserId) -> BackendResult<Option<Profile>>;

    /// Request a password-reset email
    async fn reset_password_for_email(&self, email: &str, redirect_url: &str)
    -> BackendResult<()>;

    /// Update the signed-in user's password
    async fn update_password(&self, new_password: &str) -> BackendResult<()>;

    /// Update the signed-in user's profile record
    async fn update_profile(&self, user_id: &UserId, display_name: &str)
    -> BackendResult<Profile>;
}
