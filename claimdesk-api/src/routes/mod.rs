/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login, logout and the current user
/// - `claims`: Claim CRUD, lifecycle transitions, receipts and PDF reports
/// - `users`: User management
/// - `departments`: Department listing
/// - `notifications`: Notification inbox
/// - `dashboard`: Reviewer dashboard aggregates
/// - `admin`: Operational triggers

pub mod admin;
pub mod auth;
pub mod claims;
pub mod dashboard;
pub mod departments;
pub mod health;
pub mod notifications;
pub mod users;
