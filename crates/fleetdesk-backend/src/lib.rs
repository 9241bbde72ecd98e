//! Identity backend interfaces for the fleetdesk auth store
//!
//! The remote identity service is an external collaborator; this crate
//! defines the trait the session manager programs against, plus a mock
//! implementation for unit and integration testing.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
