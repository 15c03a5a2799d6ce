//! Accounts table bootstrap.
//!
//! Drops, recreates and seeds the accounts relation before a session starts.

use sqlx::{Connection, PgConnection};
use tracing::info;

use xfer_domain::Account;

use super::Result;

/// Recreate the accounts table and seed it with `accounts`.
///
/// Runs in one transaction: either the fresh seeded table is committed or
/// the previous table is left untouched.
pub async fn bootstrap_accounts(conn: &mut PgConnection, accounts: &[Account]) -> Result<()> {
    let mut tx = conn.begin().await?;

    sqlx::query("DROP TABLE IF EXISTS accounts").execute(&mut *tx).await?;

    sqlx::query(
        r#"
        CREATE TABLE accounts (
            account_no VARCHAR(32) PRIMARY KEY,
            balance NUMERIC(15, 2) NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    for account in accounts {
        sqlx::query("INSERT INTO accounts (account_no, balance) VALUES ($1, $2)")
            .bind(account.account_no.as_str())
            .bind(account.balance)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    info!(accounts = accounts.len(), "Accounts table created");
    Ok(())
}
