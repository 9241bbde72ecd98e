//! HTTP binding for the fleetdesk identity backend
//!
//! This crate provides:
//! - `HttpAuthBackend`: a reqwest adapter implementing `AuthBackend` against
//!   the REST identity API
//! - `ConnectivityMonitor`: periodic reachability checks driving the
//!   offline queue's online/offline transitions

mod connectivity;
mod http;

pub use connectivity::*;
pub use http::*;
