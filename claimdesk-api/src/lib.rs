//! # ClaimDesk API Server Library
//!
//! This library provides the HTTP surface of ClaimDesk: routing, request
//! validation, error mapping, receipt storage and PDF reports. Business
//! rules live in `claimdesk_shared`.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Response headers
//! - `pdf`: Claim report rendering
//! - `routes`: API route handlers
//! - `storage`: Receipt file storage

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pdf;
pub mod routes;
pub mod storage;
