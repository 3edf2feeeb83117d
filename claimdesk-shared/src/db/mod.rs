/// Database layer for ClaimDesk
///
/// - `pool`: PostgreSQL connection pool with health check
/// - `migrations`: Schema migration runner
///
/// The pool handle is always passed explicitly into model and lifecycle
/// functions; nothing in this crate holds a global connection.
///
/// # Example
///
/// ```no_run
/// use claimdesk_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
