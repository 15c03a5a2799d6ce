//! PostgreSQL transactional resource.
//!
//! `PgResource` wraps exactly one `PgConnection` (not a pool). The session
//! is switched to SERIALIZABLE once at construction; transactions are then
//! opened lazily by the first statement and closed by `commit`/`rollback`.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::error::StoreError;
use crate::resource::{sort_accounts, Operation, StoreResult, TransactionalResource};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Connection, Executor, PgConnection, Row};
use tracing::{debug, warn};
use xfer_domain::{Account, AccountNo};

/// One PostgreSQL connection used as a serializable transactional resource
pub struct PgResource {
    conn: PgConnection,
    in_tx: bool,
}

impl PgResource {
    /// Connect to `database_url` and fix the session to SERIALIZABLE.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let conn = PgConnection::connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect: {}", e)))?;
        Self::serializable(conn).await
    }

    /// Wrap an existing connection and fix its session to SERIALIZABLE.
    pub async fn serializable(mut conn: PgConnection) -> StoreResult<Self> {
        conn.execute("SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .await?;
        debug!("Session isolation set to SERIALIZABLE");
        Ok(Self { conn, in_tx: false })
    }

    /// Give the connection back, e.g. to close it explicitly.
    pub fn into_inner(self) -> PgConnection {
        self.conn
    }

    async fn begin_if_needed(&mut self) -> StoreResult<()> {
        if !self.in_tx {
            self.conn.execute("BEGIN").await?;
            self.in_tx = true;
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionalResource for PgResource {
    async fn execute(&mut self, operation: &Operation) -> StoreResult<u64> {
        self.begin_if_needed().await?;

        let update = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + $1
            WHERE account_no = $2
            "#,
        )
        .bind(operation.delta())
        .bind(operation.account().as_str().to_string());

        let result = self.conn.execute(update).await?;

        let rows = result.rows_affected();
        if rows == 0 {
            warn!(account = %operation.account(), op = operation.kind(), "No such account, 0 rows updated");
        }
        Ok(rows)
    }

    async fn accounts(&mut self) -> StoreResult<Vec<Account>> {
        self.begin_if_needed().await?;

        let rows = self.conn.fetch_all("SELECT account_no, balance FROM accounts").await?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            let account_no: String = row.try_get("account_no")?;
            let balance: Decimal = row.try_get("balance")?;
            let account_no = AccountNo::new(&account_no).map_err(|e| StoreError::Database {
                code: None,
                message: format!("Invalid account_no in accounts table: {}", e),
            })?;
            accounts.push(Account::new(account_no, balance));
        }
        sort_accounts(&mut accounts);
        Ok(accounts)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if !self.in_tx {
            return Ok(());
        }
        // On failure the transaction is left marked open so the caller's
        // rollback still runs; ROLLBACK outside a transaction only warns.
        self.conn.execute("COMMIT").await?;
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.in_tx = false;
        self.conn.execute("ROLLBACK").await?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }
}
