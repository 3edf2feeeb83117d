//! # ClaimDesk Shared Library
//!
//! This crate contains the data model, store access, and business logic used
//! by both the ClaimDesk API server and the reminder worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their queries
//! - `lifecycle`: Claim status state machine and transitions
//! - `reminders`: Daily manager reminder aggregation
//! - `notifications`: Notification sink used by lifecycle and reminders
//! - `auth`: Password hashing, tokens, request authentication, role checks
//! - `db`: Connection pool and migrations
//! - `money`: Currency formatting helpers

pub mod auth;
pub mod db;
pub mod lifecycle;
pub mod models;
pub mod money;
pub mod notifications;
pub mod reminders;

/// Current version of the ClaimDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
