//! # ClaimDesk Worker
//!
//! Runs the daily manager reminder job on a fixed local schedule.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run -p claimdesk-worker
//! ```

use anyhow::Context;
use claimdesk_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    notifications::PgNotificationSink,
};
use claimdesk_worker::{config::WorkerConfig, scheduler::ReminderScheduler};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claimdesk_worker=debug,claimdesk_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "ClaimDesk Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env().context("Failed to load configuration")?;

    let pool = create_pool(DatabaseConfig::new(
        config.database_url.clone(),
        config.max_connections,
    ))
    .await
    .context("Failed to connect to database")?;

    if config.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let sink = Arc::new(PgNotificationSink::new(pool.clone()));
    let scheduler = ReminderScheduler::new(pool.clone(), sink, config.schedule);

    let shutdown = scheduler.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received, stopping scheduler...");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    scheduler.run().await;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}
