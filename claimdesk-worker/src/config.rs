/// Worker configuration
///
/// Loaded from environment variables, with `.env` support for development.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `RUN_MIGRATIONS`: Apply migrations on startup (default: true)
/// - `REMINDER_HOUR` / `REMINDER_MINUTE`: Local trigger time (default: 07:00)
/// - `REMINDER_UTC_OFFSET_MINUTES`: Offset of the local clock (default: 420, i.e. +07:00)

use chrono::{FixedOffset, NaiveTime};
use std::env;
use std::str::FromStr;

pub const DEFAULT_REMINDER_HOUR: u32 = 7;
pub const DEFAULT_REMINDER_MINUTE: u32 = 0;
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 420;

/// When the daily reminder fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Local wall-clock time of the trigger
    pub time: NaiveTime,

    /// Offset of the local clock from UTC
    pub offset: FixedOffset,
}

impl Schedule {
    /// Builds a schedule, rejecting out-of-range values
    pub fn new(hour: u32, minute: u32, utc_offset_minutes: i32) -> anyhow::Result<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            anyhow::anyhow!("Invalid reminder time {:02}:{:02}", hour, minute)
        })?;

        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!("Invalid UTC offset of {} minutes", utc_offset_minutes)
        })?;

        Ok(Self { time, offset })
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,

    pub max_connections: u32,

    pub run_migrations: bool,

    pub schedule: Schedule,
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let schedule = Schedule::new(
            parse_var("REMINDER_HOUR", DEFAULT_REMINDER_HOUR)?,
            parse_var("REMINDER_MINUTE", DEFAULT_REMINDER_MINUTE)?,
            parse_var("REMINDER_UTC_OFFSET_MINUTES", DEFAULT_UTC_OFFSET_MINUTES)?,
        )?;

        Ok(Self {
            database_url,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            run_migrations: parse_var("RUN_MIGRATIONS", true)?,
            schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let schedule = Schedule::new(
            DEFAULT_REMINDER_HOUR,
            DEFAULT_REMINDER_MINUTE,
            DEFAULT_UTC_OFFSET_MINUTES,
        )
        .unwrap();

        assert_eq!(schedule.time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(schedule.offset.local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn test_schedule_rejects_out_of_range() {
        assert!(Schedule::new(24, 0, 0).is_err());
        assert!(Schedule::new(7, 60, 0).is_err());
        assert!(Schedule::new(7, 0, 24 * 60).is_err());
    }

    #[test]
    fn test_negative_offset() {
        let schedule = Schedule::new(9, 30, -300).unwrap();
        assert_eq!(schedule.offset.local_minus_utc(), -5 * 3600);
    }
}
