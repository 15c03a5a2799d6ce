//! Daemon: session orchestrator.
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Create and seed the accounts table on the configured store
//! 3. Print the initial balances
//! 4. Run the transfer workflow until input ends
//! 5. Ctrl-C at any point cancels the session

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::info;

use xfer_domain::seed_accounts;
use xfer_exec::{RetryDelay, RetryingExecutor, TokioDelay};
use xfer_store::{MemoryStore, TransactionalResource};

use crate::config::{Config, StoreBackend};
use crate::display::BalanceReporter;
use crate::error::{DaemonError, DaemonResult};
use crate::input::{ConsoleSource, TransferSource};
use crate::workflow::{TransferWorkflow, WorkflowSummary};

// =============================================================================
// Daemon
// =============================================================================

/// The xfer daemon: one interactive transfer session.
pub struct Daemon<D: RetryDelay = TokioDelay> {
    /// Configuration
    config: Config,
    /// Workflow driving the executor
    workflow: TransferWorkflow<D>,
    /// Session-wide interrupt
    cancel: CancellationToken,
}

impl Daemon<TokioDelay> {
    /// Create a daemon that pauses between attempts with a real timer.
    pub fn new(config: Config) -> Self {
        let executor = RetryingExecutor::new(config.retry_policy(), config.classifier());
        Self::with_executor(config, executor)
    }
}

impl<D: RetryDelay> Daemon<D> {
    /// Create a daemon with a custom executor.
    pub fn with_executor(config: Config, executor: RetryingExecutor<D>) -> Self {
        let cancel = CancellationToken::new();
        Self {
            config,
            workflow: TransferWorkflow::new(executor, cancel.clone()),
            cancel,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the workflow.
    pub fn workflow(&self) -> &TransferWorkflow<D> {
        &self.workflow
    }

    /// Token that interrupts the session when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the daemon on stdin/stdout.
    ///
    /// This method returns when input ends, a transfer fails terminally,
    /// or the user presses Ctrl-C.
    pub async fn run(&self) -> DaemonResult<WorkflowSummary> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            store = %self.config.store.backend,
            max_retries = self.config.retry.max_retries,
            retry_delay_ms = self.config.retry.retry_delay.as_millis() as u64,
            "Starting xfer daemon"
        );

        let cancel = self.cancel.clone();
        let signal_task = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("Received interrupt signal");
                        cancel.cancel();
                    }
                }
            }
        });

        let mut source = ConsoleSource::stdio();
        let mut reporter = BalanceReporter::stdout();

        let result = match self.config.store.backend {
            StoreBackend::Memory => self.run_memory(&mut source, &mut reporter).await,
            StoreBackend::Postgres => self.run_postgres(&mut source, &mut reporter).await,
        };

        signal_task.abort();
        result
    }

    /// Seed an in-process store and run a session on it.
    pub async fn run_memory<S, W>(
        &self,
        source: &mut S,
        reporter: &mut BalanceReporter<W>,
    ) -> DaemonResult<WorkflowSummary>
    where
        S: TransferSource,
        W: AsyncWrite + Unpin + Send,
    {
        let store = MemoryStore::with_accounts(seed_accounts(self.config.seed_accounts));
        info!(accounts = self.config.seed_accounts, "Accounts table created");
        reporter.line("Table created.").await?;

        let mut conn = store.connect();
        self.run_session(&mut conn, source, reporter).await
    }

    /// Connect, recreate the accounts table and run a session on PostgreSQL.
    #[cfg(feature = "postgres")]
    pub async fn run_postgres<S, W>(
        &self,
        source: &mut S,
        reporter: &mut BalanceReporter<W>,
    ) -> DaemonResult<WorkflowSummary>
    where
        S: TransferSource,
        W: AsyncWrite + Unpin + Send,
    {
        use sqlx::Connection;

        let url = self
            .config
            .store
            .database_url
            .as_deref()
            .ok_or_else(|| DaemonError::Config("DATABASE_URL is not set".to_string()))?;

        info!("Connecting to the database");
        let mut conn = sqlx::PgConnection::connect(url)
            .await
            .map_err(|e| DaemonError::Store(e.into()))?;

        let existing = xfer_db::status(&mut conn)
            .await
            .map_err(|e| DaemonError::Bootstrap(e.to_string()))?;
        info!(existing_accounts = ?existing, "Database reachable");

        xfer_db::bootstrap_accounts(&mut conn, &seed_accounts(self.config.seed_accounts))
            .await
            .map_err(|e| DaemonError::Bootstrap(e.to_string()))?;
        reporter.line("Table created.").await?;

        let mut resource = xfer_store::PgResource::serializable(conn).await?;
        self.run_session(&mut resource, source, reporter).await
    }

    /// PostgreSQL support is compiled out.
    #[cfg(not(feature = "postgres"))]
    pub async fn run_postgres<S, W>(
        &self,
        _source: &mut S,
        _reporter: &mut BalanceReporter<W>,
    ) -> DaemonResult<WorkflowSummary>
    where
        S: TransferSource,
        W: AsyncWrite + Unpin + Send,
    {
        Err(DaemonError::Config(
            "xferd was built without the postgres feature".to_string(),
        ))
    }

    /// Print the initial balances, then run the workflow on `resource`.
    pub async fn run_session<R, S, W>(
        &self,
        resource: &mut R,
        source: &mut S,
        reporter: &mut BalanceReporter<W>,
    ) -> DaemonResult<WorkflowSummary>
    where
        R: TransactionalResource,
        S: TransferSource,
        W: AsyncWrite + Unpin + Send,
    {
        reporter.report(&mut *resource).await?;
        let summary = self.workflow.run(resource, source, reporter).await?;
        reporter.line("Finished, exiting").await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_memory_session_prints_initial_table() {
        let mut config = Config::test();
        config.seed_accounts = 2;
        let daemon = Daemon::new(config);
        let mut source = ConsoleSource::new(BufReader::new(&b"\n"[..]), Vec::new());
        let mut reporter = BalanceReporter::new(Vec::new());

        let summary = daemon.run_memory(&mut source, &mut reporter).await.unwrap();

        assert_eq!(summary, WorkflowSummary::default());
        assert_eq!(
            String::from_utf8(reporter.into_inner()).unwrap(),
            "Table created.\nAccounts table:\n1, 100\n2, 200\nFinished, exiting\n"
        );
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_postgres_backend_requires_feature() {
        let daemon = Daemon::new(Config::test());
        let mut source = ConsoleSource::new(BufReader::new(&b""[..]), Vec::new());
        let mut reporter = BalanceReporter::new(Vec::new());

        let result = daemon.run_postgres(&mut source, &mut reporter).await;

        assert!(matches!(result, Err(DaemonError::Config(_))));
    }
}
