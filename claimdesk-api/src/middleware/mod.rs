/// Middleware modules for the API server
///
/// Session authentication lives in `claimdesk_shared::auth::middleware`;
/// this crate adds:
/// - Security headers

pub mod security;
