//! # ClaimDesk Worker Library
//!
//! Background jobs for ClaimDesk. Currently this is the daily reminder that
//! tells each manager how many claims are waiting for their review.
//!
//! ## Modules
//!
//! - `config`: Environment configuration and the reminder schedule
//! - `scheduler`: Daily trigger loop around the reminder job

pub mod config;
pub mod scheduler;
