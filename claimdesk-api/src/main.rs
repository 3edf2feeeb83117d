//! # ClaimDesk API Server
//!
//! REST API for expense claims: employees create and submit claims with
//! receipts, managers approve or reject them, admins manage users.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... JWT_SECRET=... cargo run -p claimdesk-api
//! ```

use anyhow::Context;
use claimdesk_api::{
    app::{build_router, AppState},
    config::{BootstrapAdmin, Config},
};
use claimdesk_shared::{
    auth::password::hash_password,
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    models::user::{CreateUser, User, UserRole},
};
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claimdesk_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "ClaimDesk API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(DatabaseConfig::new(
        config.database.url.clone(),
        config.database.max_connections,
    ))
    .await
    .context("Failed to connect to database")?;

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&pool, admin).await?;
    }

    tokio::fs::create_dir_all(config.uploads.dir.join("receipts"))
        .await
        .with_context(|| format!("Failed to create upload directory {:?}", config.uploads.dir))?;

    let address = config.bind_address();
    let state = AppState::new(pool.clone(), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Creates the first admin account when no users exist yet
async fn bootstrap_admin(pool: &PgPool, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    if User::count(pool).await? > 0 {
        return Ok(());
    }

    let password_hash = hash_password(&admin.password).context("Failed to hash admin password")?;

    let user = User::create(
        pool,
        CreateUser {
            name: "Administrator".to_string(),
            email: admin.email.clone(),
            password_hash,
            role: UserRole::Admin,
            department_id: None,
            manager_id: None,
        },
    )
    .await
    .context("Failed to create bootstrap admin")?;

    tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
