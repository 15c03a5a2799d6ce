//! Database lifecycle management for xfer.
//!
//! Provides connectivity checks and the accounts table bootstrap.

mod init;

pub use init::bootstrap_accounts;

use sqlx::PgConnection;
use tracing::{info, warn};

/// Result type for DB operations.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Check database connectivity and report the accounts table state.
///
/// Returns the number of accounts, or `None` if the table does not exist yet.
pub async fn status(conn: &mut PgConnection) -> Result<Option<i64>> {
    // Check connectivity
    let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&mut *conn).await?;

    if result != 1 {
        return Err(anyhow::anyhow!("Database connectivity check failed"));
    }

    info!("Database connectivity: OK");

    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = 'accounts'
        )
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        warn!("Accounts table not found (it is created at startup)");
        return Ok(None);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts").fetch_one(&mut *conn).await?;
    info!(count, "Accounts table present");

    Ok(Some(count))
}
