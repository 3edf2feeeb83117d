/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use claimdesk_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = claimdesk_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer, storage::ReceiptStore};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use claimdesk_shared::auth::middleware::authenticate;
use claimdesk_shared::notifications::{NotificationSink, PgNotificationSink};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Room for multipart framing on top of the receipt itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Where claim and reminder notifications go
    pub notifier: Arc<dyn NotificationSink>,

    /// Receipt files
    pub receipts: ReceiptStore,
}

impl AppState {
    /// Creates state backed by the database notification sink
    pub fn new(db: PgPool, config: Config) -> Self {
        let notifier = Arc::new(PgNotificationSink::new(db.clone()));
        Self::with_notifier(db, config, notifier)
    }

    pub fn with_notifier(db: PgPool, config: Config, notifier: Arc<dyn NotificationSink>) -> Self {
        let receipts = ReceiptStore::new(config.uploads.dir.clone());
        Self {
            db,
            config: Arc::new(config),
            notifier,
            receipts,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                        (public)
/// ├── /auth
/// │   ├── POST /login                     (public)
/// │   ├── POST /logout                    (public)
/// │   └── GET  /me
/// ├── /claims
/// │   ├── GET, POST /
/// │   ├── GET, PUT, DELETE /:id
/// │   ├── PUT  /:id/submit | /:id/approve | /:id/reject
/// │   ├── POST /:id/upload-receipt
/// │   └── GET  /:id/download-pdf
/// ├── /users                              GET, POST; PUT, DELETE /:id
/// ├── GET  /departments
/// ├── /notifications                      GET; PUT /:id/read; PUT /mark-all-read
/// ├── GET  /dashboard
/// ├── POST /admin/trigger-reminders
/// └── /uploads/receipts/*                 (static, public)
/// ```
///
/// Everything except health, login, logout and uploads passes through
/// [`jwt_auth_layer`]. Role checks happen in the handlers.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Public
    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout));

    let claim_routes = Router::new()
        .route("/", get(routes::claims::list_claims).post(routes::claims::create_claim))
        .route(
            "/:id",
            get(routes::claims::get_claim)
                .put(routes::claims::update_claim)
                .delete(routes::claims::delete_claim),
        )
        .route("/:id/submit", put(routes::claims::submit_claim))
        .route("/:id/approve", put(routes::claims::approve_claim))
        .route("/:id/reject", put(routes::claims::reject_claim))
        .route(
            "/:id/upload-receipt",
            post(routes::claims::upload_receipt).layer(DefaultBodyLimit::max(
                state.config.uploads.max_bytes + MULTIPART_OVERHEAD,
            )),
        )
        .route("/:id/download-pdf", get(routes::claims::download_pdf));

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users).post(routes::users::create_user))
        .route(
            "/:id",
            put(routes::users::update_user).delete(routes::users::delete_user),
        );

    let notification_routes = Router::new()
        .route("/", get(routes::notifications::list_notifications))
        .route("/mark-all-read", put(routes::notifications::mark_all_read))
        .route("/:id/read", put(routes::notifications::mark_read));

    // Require an authenticated session
    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .nest("/claims", claim_routes)
        .nest("/users", user_routes)
        .route("/departments", get(routes::departments::list_departments))
        .nest("/notifications", notification_routes)
        .route("/dashboard", get(routes::dashboard::get_dashboard))
        .route("/admin/trigger-reminders", post(routes::admin::trigger_reminders))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/uploads", ServeDir::new(state.receipts.root()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Session authentication layer
///
/// Accepts the token from the `Authorization: Bearer` header or the
/// `auth-token` cookie, re-reads the user and injects an `AuthContext`
/// into the request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.db, state.jwt_secret(), req.headers()).await?;

    tracing::debug!(user_id = %auth.user_id, role = %auth.role, "Request authenticated");
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
