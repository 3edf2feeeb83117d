/// Daily reminder scheduler
///
/// Sleeps until the next local trigger time, runs the manager reminder job
/// and repeats until shutdown.
///
/// # Architecture
///
/// ```text
/// ReminderScheduler
///   ├─> next_run: Next trigger instant after now
///   ├─> sleep (cancellable)
///   └─> run_reminders(since = start of local day)
///         └─> NotificationSink: One reminder per manager
/// ```
///
/// The watermark makes a run idempotent within a local day: a restart right
/// after the trigger does not remind the same manager twice.
///
/// # Example
///
/// ```no_run
/// use claimdesk_worker::{config::Schedule, scheduler::ReminderScheduler};
/// use claimdesk_shared::notifications::PgNotificationSink;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let schedule = Schedule::new(7, 0, 420)?;
/// let sink = Arc::new(PgNotificationSink::new(pool.clone()));
/// let scheduler = ReminderScheduler::new(pool, sink, schedule);
///
/// scheduler.run().await;
/// # Ok(())
/// # }
/// ```

use crate::config::Schedule;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use claimdesk_shared::notifications::NotificationSink;
use claimdesk_shared::reminders::{run_reminders, ReminderRun, ReminderSummary};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// UTC instant of a local wall-clock time
fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, Utc)
}

/// First trigger strictly after `now`
pub fn next_run(now: DateTime<Utc>, schedule: &Schedule) -> DateTime<Utc> {
    let today = now.with_timezone(&schedule.offset).date_naive();
    let candidate = local_to_utc(today, schedule.time, schedule.offset);

    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// Midnight of the local day containing `now`, as a UTC instant
pub fn start_of_local_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let today = now.with_timezone(&offset).date_naive();
    local_to_utc(today, NaiveTime::MIN, offset)
}

/// Runs the reminder job once a day
pub struct ReminderScheduler {
    pool: PgPool,

    sink: Arc<dyn NotificationSink>,

    schedule: Schedule,

    /// Shutdown token
    shutdown_token: CancellationToken,
}

impl ReminderScheduler {
    pub fn new(pool: PgPool, sink: Arc<dyn NotificationSink>, schedule: Schedule) -> Self {
        Self {
            pool,
            sink,
            schedule,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets shutdown token
    ///
    /// Used to signal graceful shutdown from external handlers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs one reminder pass as of `now`
    ///
    /// Managers already reminded since local midnight are skipped. Errors are
    /// logged and reported as `None`; they never stop the scheduler.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Option<ReminderSummary> {
        let since = start_of_local_day(now, self.schedule.offset);

        let run = ReminderRun::Scheduled { since };

        match run_reminders(&self.pool, self.sink.as_ref(), now, run).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::error!(error = %e, "Daily reminder run failed");
                None
            }
        }
    }

    /// Loops until the shutdown token is cancelled
    pub async fn run(&self) {
        tracing::info!(
            time = %self.schedule.time,
            offset = %self.schedule.offset,
            "Reminder scheduler starting"
        );

        loop {
            let now = Utc::now();
            let next = next_run(now, &self.schedule);
            let wait = (next - now).to_std().unwrap_or_default();

            tracing::info!(next_run = %next, "Next reminder run scheduled");

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Reminder scheduler shut down");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            self.run_once(Utc::now()).await;
        }
    }
}
