//! Typed error taxonomy for auth operations
//!
//! Errors are both returned to callers and stored in state for passive UI
//! observers, so they are plain data with serde support rather than opaque
//! error trait objects.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation-level error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InitError,
    SignInError,
    SignOutError,
    RefreshError,
    ProfileLoadError,
    PasswordResetError,
    PasswordUpdateError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InitError => "INIT_ERROR",
            ErrorCode::SignInError => "SIGNIN_ERROR",
            ErrorCode::SignOutError => "SIGNOUT_ERROR",
            ErrorCode::RefreshError => "REFRESH_ERROR",
            ErrorCode::ProfileLoadError => "PROFILE_LOAD_ERROR",
            ErrorCode::PasswordResetError => "PASSWORD_RESET_ERROR",
            ErrorCode::PasswordUpdateError => "PASSWORD_UPDATE_ERROR",
        }
    }
}

/// Which layer produced the error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Backend,
    Timeout,
    Cache,
    Queue,
    Internal,
}

/// A typed auth error: returned to the caller and mirrored into shared
/// state for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthError {
    pub code: ErrorCode,
    pub message: String,
    pub source: ErrorSource,
    pub timestamp: DateTime<Local>,
}

impl AuthError {
    pub fn new(code: ErrorCode, source: ErrorSource, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source,
            timestamp: Local::now(),
        }
    }

    pub fn backend(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorSource::Backend, message)
    }

    pub fn timeout(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorSource::Timeout, message)
    }

    pub fn internal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorSource::Internal, message)
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = Result<T, AuthError>;
