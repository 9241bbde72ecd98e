//! Persistence layer for the fleetdesk auth store
//!
//! Only a restricted subset of auth state survives process restarts: the
//! user identity, profile, last auth check, cache counters, and the offline
//! queue. Session tokens and timers are deliberately excluded - tokens must
//! not be written to durable client storage, and timers cannot be durably
//! persisted.

mod sqlite;
mod traits;

pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
