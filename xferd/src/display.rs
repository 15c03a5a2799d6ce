//! Balance display.

use std::fmt::Write as _;

use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use xfer_domain::Account;
use xfer_store::TransactionalResource;

use crate::error::DaemonResult;

/// Render the accounts table as printed after each transfer.
pub fn render_table(accounts: &[Account]) -> String {
    let mut table = String::from("Accounts table:\n");
    for account in accounts {
        // Writing to a String cannot fail
        let _ = writeln!(table, "{}, {}", account.account_no, account.balance);
    }
    table
}

/// Writes user-facing output: progress lines and the balance table.
pub struct BalanceReporter<W> {
    out: W,
}

impl BalanceReporter<io::Stdout> {
    /// Reporter writing to the process stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> BalanceReporter<W> {
    /// Create a reporter over any writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write one line.
    pub async fn line(&mut self, text: &str) -> DaemonResult<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }

    /// Read the balances in their own short transaction and print them.
    ///
    /// The read is committed, or rolled back if either the read or the
    /// commit fails, so the resource is left without an open transaction.
    pub async fn report<R: TransactionalResource>(&mut self, resource: &mut R) -> DaemonResult<Vec<Account>> {
        let read = match resource.accounts().await {
            Ok(accounts) => resource.commit().await.map(|()| accounts),
            Err(e) => Err(e),
        };

        let accounts = match read {
            Ok(accounts) => accounts,
            Err(e) => {
                if let Err(rollback_err) = resource.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed balance read also failed");
                }
                return Err(e.into());
            },
        };

        self.out.write_all(render_table(&accounts).as_bytes()).await?;
        self.out.flush().await?;
        Ok(accounts)
    }
}
