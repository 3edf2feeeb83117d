/// Integration tests for the daily manager reminder run
///
/// Run with: cargo test --test reminder_tests

mod common;

use chrono::{Duration, Utc};
use claimdesk_shared::lifecycle::{create_claim, submit_claim};
use claimdesk_shared::models::notification::{
    Notification, NotificationType, DAILY_REVIEW_REMINDER, INBOX_LIMIT,
};
use claimdesk_shared::models::user::UserRole;
use claimdesk_shared::notifications::{MemoryNotificationSink, PgNotificationSink};
use claimdesk_shared::reminders::{run_reminders, ReminderRun};
use common::{actor, create_user, draft, setup_pool};
use uuid::Uuid;

async fn reminders_for(pool: &sqlx::PgPool, manager_id: Uuid) -> Vec<Notification> {
    Notification::list_for_user(pool, manager_id, INBOX_LIMIT)
        .await
        .unwrap()
        .into_iter()
        .filter(|n| {
            n.data
                .as_ref()
                .and_then(|d| d.get("reminder_type"))
                .and_then(|v| v.as_str())
                == Some(DAILY_REVIEW_REMINDER)
        })
        .collect()
}

#[tokio::test]
async fn test_reminders_group_by_manager_and_respect_watermark() {
    let pool = setup_pool().await;
    let submit_sink = MemoryNotificationSink::new();
    let started = Utc::now() - Duration::seconds(1);

    let first_manager = create_user(&pool, UserRole::Manager, None).await;
    let second_manager = create_user(&pool, UserRole::Manager, None).await;
    let alice = create_user(&pool, UserRole::Employee, Some(first_manager.id)).await;
    let bob = create_user(&pool, UserRole::Employee, Some(first_manager.id)).await;
    let carol = create_user(&pool, UserRole::Employee, Some(second_manager.id)).await;

    let mut first_claims = Vec::new();
    for (owner, amount) in [(&alice, "120.00"), (&bob, "30.50")] {
        let created = create_claim(&pool, &actor(owner), draft("Team offsite", &[amount]))
            .await
            .unwrap();
        submit_claim(&pool, &submit_sink, &actor(owner), created.claim.id)
            .await
            .unwrap();
        first_claims.push(created.claim.id);
    }
    let carol_claim = create_claim(&pool, &actor(&carol), draft("Books", &["42.00"]))
        .await
        .unwrap();
    submit_claim(&pool, &submit_sink, &actor(&carol), carol_claim.claim.id)
        .await
        .unwrap();

    let sink = PgNotificationSink::new(pool.clone());
    let summary = run_reminders(&pool, &sink, Utc::now(), ReminderRun::Scheduled { since: started })
        .await
        .unwrap();
    assert!(summary.managers_notified >= 2);
    assert!(summary.claims_considered >= 3);

    let first = reminders_for(&pool, first_manager.id).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind, NotificationType::Warning);
    assert!(first[0].message.starts_with("You have 2 expense claims"));
    let data = first[0].data.clone().unwrap();
    assert_eq!(data["claim_count"], 2);
    let ids: Vec<String> = data["claim_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    for id in &first_claims {
        assert!(ids.contains(&id.to_string()));
    }
    assert_eq!(data["total_amount"], 150.5);

    let second = reminders_for(&pool, second_manager.id).await;
    assert_eq!(second.len(), 1);
    assert!(second[0].message.starts_with("You have 1 expense claim "));

    // Same day, same watermark: nobody is reminded twice
    let rerun = run_reminders(&pool, &sink, Utc::now(), ReminderRun::Scheduled { since: started })
        .await
        .unwrap();
    assert!(rerun.managers_skipped >= 2);
    assert_eq!(reminders_for(&pool, first_manager.id).await.len(), 1);
    assert_eq!(reminders_for(&pool, second_manager.id).await.len(), 1);
}

#[tokio::test]
async fn test_claims_without_manager_are_reported_not_sent() {
    let pool = setup_pool().await;
    let submit_sink = MemoryNotificationSink::new();
    let loner = create_user(&pool, UserRole::Employee, None).await;

    let created = create_claim(&pool, &actor(&loner), draft("Stationery", &["8.99"]))
        .await
        .unwrap();
    submit_claim(&pool, &submit_sink, &actor(&loner), created.claim.id)
        .await
        .unwrap();

    let sink = MemoryNotificationSink::new();
    let summary = run_reminders(&pool, &sink, Utc::now(), ReminderRun::Manual).await.unwrap();

    assert!(summary.claims_without_manager >= 1);
    assert!(sink.sent().iter().all(|n| n.user_id != loner.id));
    assert!(sink.sent().iter().all(|n| {
        n.data.as_ref().and_then(|d| d["claim_ids"].as_array()).map_or(true, |ids| {
            ids.iter().all(|id| id.as_str() != Some(created.claim.id.to_string().as_str()))
        })
    }));
}

#[tokio::test]
async fn test_failed_sends_are_counted() {
    let pool = setup_pool().await;
    let submit_sink = MemoryNotificationSink::new();
    let manager = create_user(&pool, UserRole::Manager, None).await;
    let employee = create_user(&pool, UserRole::Employee, Some(manager.id)).await;

    let created = create_claim(&pool, &actor(&employee), draft("Cab", &["19.00"]))
        .await
        .unwrap();
    submit_claim(&pool, &submit_sink, &actor(&employee), created.claim.id)
        .await
        .unwrap();

    let summary = run_reminders(&pool, &MemoryNotificationSink::failing(), Utc::now(), ReminderRun::Manual)
        .await
        .unwrap();

    assert!(summary.notifications_failed >= 1);
    assert_eq!(summary.managers_notified, 0);
}

#[tokio::test]
async fn test_manual_run_does_not_suppress_scheduled_run() {
    let pool = setup_pool().await;
    let submit_sink = MemoryNotificationSink::new();
    let started = Utc::now() - Duration::seconds(1);

    let manager = create_user(&pool, UserRole::Manager, None).await;
    let employee = create_user(&pool, UserRole::Employee, Some(manager.id)).await;

    let created = create_claim(&pool, &actor(&employee), draft("Client lunch", &["64.10"]))
        .await
        .unwrap();
    submit_claim(&pool, &submit_sink, &actor(&employee), created.claim.id)
        .await
        .unwrap();

    let sink = PgNotificationSink::new(pool.clone());
    run_reminders(&pool, &sink, Utc::now(), ReminderRun::Manual)
        .await
        .unwrap();
    assert_eq!(reminders_for(&pool, manager.id).await.len(), 1);

    // The scheduled run later the same day still reminds the manager
    let scheduled = ReminderRun::Scheduled { since: started };
    run_reminders(&pool, &sink, Utc::now(), scheduled).await.unwrap();

    let reminders = reminders_for(&pool, manager.id).await;
    assert_eq!(reminders.len(), 2);
    let triggers: Vec<String> = reminders
        .iter()
        .map(|n| n.data.as_ref().unwrap()["trigger"].as_str().unwrap().to_string())
        .collect();
    assert!(triggers.contains(&"manual".to_string()));
    assert!(triggers.contains(&"scheduled".to_string()));

    // A second scheduled run is suppressed
    run_reminders(&pool, &sink, Utc::now(), scheduled).await.unwrap();
    assert_eq!(reminders_for(&pool, manager.id).await.len(), 2);
}
