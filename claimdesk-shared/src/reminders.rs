/// Daily review reminders
///
/// Collects every IN_REVIEW claim, groups the claims by the submitter's
/// manager and sends each manager one WARNING notification summarising the
/// claims waiting on them.
///
/// Planning is a pure function over the fetched rows ([`plan_reminders`]);
/// [`run_reminders`] fetches, plans and dispatches.
///
/// # Watermark
///
/// A [`ReminderRun::Scheduled`] run carries a `since` timestamp. Managers that
/// already received a scheduled reminder at or after it are skipped, which
/// keeps a restarted worker from reminding twice on the same day.
/// [`ReminderRun::Manual`] runs always send, and their reminders are tagged so
/// they never count against the scheduled watermark.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::claim::{ExpenseClaim, PendingClaim};
use crate::models::notification::{
    NewNotification, Notification, NotificationType, DAILY_REVIEW_REMINDER, MANUAL_TRIGGER,
    SCHEDULED_TRIGGER,
};
use crate::money::format_usd;
use crate::notifications::NotificationSink;

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What started a reminder run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderRun {
    /// Daily trigger; skips managers already reminded by a scheduled run since `since`
    Scheduled { since: DateTime<Utc> },

    /// Admin request; always sends
    Manual,
}

impl ReminderRun {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderRun::Scheduled { .. } => SCHEDULED_TRIGGER,
            ReminderRun::Manual => MANUAL_TRIGGER,
        }
    }
}

/// Reminder for one manager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerReminder {
    pub manager_id: Uuid,

    /// Claims in submission order, oldest first
    pub claim_ids: Vec<Uuid>,

    pub total_amount: Decimal,

    /// Whole days the oldest claim has been waiting
    pub days_pending: i64,
}

fn plural(count: i64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

impl ManagerReminder {
    pub fn claim_count(&self) -> usize {
        self.claim_ids.len()
    }

    pub fn title(&self) -> String {
        let n = self.claim_count() as i64;
        format!("{} Expense Claim{} Pending Review", n, plural(n))
    }

    pub fn message(&self) -> String {
        let n = self.claim_count() as i64;
        let mut message = format!(
            "You have {} expense claim{} waiting for your review with a total amount of {}.",
            n,
            plural(n),
            format_usd(self.total_amount)
        );

        if self.days_pending > 0 {
            message.push_str(&format!(
                " The oldest claim has been pending for {} day{}.",
                self.days_pending,
                plural(self.days_pending)
            ));
        }

        message.push_str(" Please review and approve or reject these claims.");
        message
    }

    /// Notification for the manager
    ///
    /// `total_amount` is sent as a JSON number.
    pub fn to_notification(&self, run: ReminderRun) -> NewNotification {
        NewNotification {
            user_id: self.manager_id,
            claim_id: None,
            sender_id: None,
            title: self.title(),
            message: self.message(),
            kind: NotificationType::Warning,
            data: Some(json!({
                "claim_count": self.claim_count(),
                "total_amount": self.total_amount.to_f64(),
                "days_pending": self.days_pending,
                "claim_ids": self.claim_ids,
                "reminder_type": DAILY_REVIEW_REMINDER,
                "trigger": run.as_str(),
            })),
        }
    }
}

/// Outcome of grouping pending claims
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReminderPlan {
    /// One entry per manager to notify, in order of each manager's oldest claim
    pub reminders: Vec<ManagerReminder>,

    /// Claims whose owner has no manager
    pub unassigned_claims: Vec<Uuid>,

    /// Managers left out because they were already reminded
    pub skipped_managers: Vec<Uuid>,
}

/// Whole days between `submitted_at` and `now`, never negative
pub fn days_pending(submitted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    submitted_at
        .map(|at| (now - at).num_days().max(0))
        .unwrap_or(0)
}

/// Groups IN_REVIEW claims by manager
///
/// `pending` is expected oldest submission first; the order of `claim_ids`
/// and of the returned reminders follows it.
pub fn plan_reminders(
    pending: &[PendingClaim],
    now: DateTime<Utc>,
    already_reminded: &HashSet<Uuid>,
) -> ReminderPlan {
    let mut plan = ReminderPlan::default();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut oldest: Vec<Option<DateTime<Utc>>> = Vec::new();

    for claim in pending {
        let Some(manager_id) = claim.manager_id else {
            plan.unassigned_claims.push(claim.id);
            continue;
        };

        if already_reminded.contains(&manager_id) {
            if !plan.skipped_managers.contains(&manager_id) {
                plan.skipped_managers.push(manager_id);
            }
            continue;
        }

        let slot = *index.entry(manager_id).or_insert_with(|| {
            plan.reminders.push(ManagerReminder {
                manager_id,
                claim_ids: Vec::new(),
                total_amount: Decimal::ZERO,
                days_pending: 0,
            });
            oldest.push(None);
            plan.reminders.len() - 1
        });

        let reminder = &mut plan.reminders[slot];
        reminder.claim_ids.push(claim.id);
        reminder.total_amount += claim.total_amount;

        if let Some(submitted_at) = claim.submitted_at {
            oldest[slot] = Some(oldest[slot].map_or(submitted_at, |o| o.min(submitted_at)));
        }
    }

    for (reminder, oldest) in plan.reminders.iter_mut().zip(oldest) {
        reminder.days_pending = days_pending(oldest, now);
    }

    plan
}

/// Counts reported after a reminder run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderSummary {
    pub claims_considered: usize,
    pub managers_notified: usize,
    pub claims_without_manager: usize,
    pub managers_skipped: usize,
    pub notifications_failed: usize,
}

/// Fetches pending claims, plans reminders and sends them through `sink`
///
/// A failed send is logged and counted; the remaining managers are still
/// notified.
pub async fn run_reminders(
    pool: &PgPool,
    sink: &dyn NotificationSink,
    now: DateTime<Utc>,
    run: ReminderRun,
) -> Result<ReminderSummary, ReminderError> {
    info!(run = ?run, "Starting daily manager reminder run");

    let pending = ExpenseClaim::list_pending_review(pool).await?;

    let already_reminded: HashSet<Uuid> = match run {
        ReminderRun::Scheduled { since } => Notification::reminded_since(pool, since)
            .await?
            .into_iter()
            .collect(),
        ReminderRun::Manual => HashSet::new(),
    };

    let plan = plan_reminders(&pending, now, &already_reminded);
    let summary = dispatch_plan(sink, &plan, pending.len(), run).await;

    info!(
        claims_considered = summary.claims_considered,
        managers_notified = summary.managers_notified,
        claims_without_manager = summary.claims_without_manager,
        managers_skipped = summary.managers_skipped,
        notifications_failed = summary.notifications_failed,
        "Daily manager reminder run completed"
    );

    Ok(summary)
}

/// Sends every reminder of `plan`
pub async fn dispatch_plan(
    sink: &dyn NotificationSink,
    plan: &ReminderPlan,
    claims_considered: usize,
    run: ReminderRun,
) -> ReminderSummary {
    let mut summary = ReminderSummary {
        claims_considered,
        claims_without_manager: plan.unassigned_claims.len(),
        managers_skipped: plan.skipped_managers.len(),
        ..Default::default()
    };

    for claim_id in &plan.unassigned_claims {
        warn!(claim_id = %claim_id, "Claim pending review has no assigned manager");
    }

    for reminder in &plan.reminders {
        match sink.send(reminder.to_notification(run)).await {
            Ok(notification_id) => {
                summary.managers_notified += 1;
                info!(
                    manager_id = %reminder.manager_id,
                    notification_id = %notification_id,
                    claim_count = reminder.claim_count(),
                    total_amount = %reminder.total_amount,
                    "Reminder sent"
                );
            }
            Err(e) => {
                summary.notifications_failed += 1;
                error!(
                    manager_id = %reminder.manager_id,
                    error = %e,
                    "Failed to send reminder"
                );
            }
        }
    }

    summary
}
