//! Transfer workflow.
//!
//! Pulls requests from a source and runs each one through the retrying
//! executor, strictly one at a time. Invalid requests are reported and
//! skipped; store failures and interrupts end the session.

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use xfer_exec::{RetryDelay, RetryingExecutor, TokioDelay, TransferWork};
use xfer_store::TransactionalResource;

use crate::display::BalanceReporter;
use crate::error::{DaemonError, DaemonResult};
use crate::input::{SourceEvent, TransferSource};

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowSummary {
    /// Transfers committed
    pub completed: u32,
    /// Requests rejected before reaching the store
    pub rejected: u32,
    /// Attempts beyond the first, over all completed transfers
    pub retries: u32,
}

/// Sequential transfer loop over one resource.
pub struct TransferWorkflow<D: RetryDelay = TokioDelay> {
    executor: RetryingExecutor<D>,
    cancel: CancellationToken,
}

impl<D: RetryDelay> TransferWorkflow<D> {
    /// Create a workflow. `cancel` interrupts input and retry pauses.
    pub fn new(executor: RetryingExecutor<D>, cancel: CancellationToken) -> Self {
        Self { executor, cancel }
    }

    /// Get the executor.
    pub fn executor(&self) -> &RetryingExecutor<D> {
        &self.executor
    }

    /// Run until the source ends, a transfer fails terminally, or the
    /// session is cancelled.
    pub async fn run<R, S, W>(
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
        let mut summary = WorkflowSummary::default();

        loop {
            let event = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("Interrupted while waiting for input");
                    return Err(DaemonError::Interrupted);
                }

                event = source.next_request() => event?,
            };

            let request = match event {
                SourceEvent::End => break,
                SourceEvent::Invalid(e) => {
                    warn!(error = %e, "Invalid transfer request, skipped");
                    reporter.line(&format!("Invalid request: {}", e)).await?;
                    summary.rejected += 1;
                    continue;
                },
                SourceEvent::Request(request) => request,
            };

            info!(
                request_id = %request.id,
                from = %request.from,
                to = %request.to,
                amount = %request.amount,
                "Transfer requested"
            );
            reporter
                .line(&format!(
                    "Doing transfer of {} from account {} to account {}",
                    request.amount, request.from, request.to
                ))
                .await?;

            let request_id = request.id;
            let work = TransferWork::new(request);

            let report = match self.executor.run(&mut *resource, &work, &self.cancel).await {
                Ok(report) => report,
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "Transfer failed");
                    return Err(e.into());
                },
            };

            info!(request_id = %request_id, attempts = report.attempts, "Transfer committed");
            reporter.line("Transfer complete").await?;
            reporter.report(&mut *resource).await?;

            summary.completed += 1;
            summary.retries += report.attempts.saturating_sub(1);
        }

        info!(
            completed = summary.completed,
            rejected = summary.rejected,
            retries = summary.retries,
            "Input finished"
        );
        Ok(summary)
    }
}
