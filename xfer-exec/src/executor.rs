//! Retrying transaction executor.
//!
//! Runs a unit of work against a transactional resource, commits on
//! success, and retries serialization conflicts and deadlocks with a fixed
//! pause up to a bounded number of attempts.
//!
//! # State machine
//!
//! ```text
//!              ┌──────────────── retryable, attempts left ───────────────┐
//!              ▼                                                         │
//! Attempting ──┬─ ok + commit ok ──────────────────────────► Succeeded   │
//!              ├─ fatal ──────────────── rollback ─────────► Failed      │
//!              ├─ retryable, last attempt ── rollback ─────► Failed      │
//!              └─ retryable ──────────── rollback ─► WaitingToRetry ─────┘
//!                                                        │
//!                                                        └─ cancelled ─► Failed
//! ```
//!
//! Every path out of the machine leaves the resource with no open
//! transaction: success ends in commit, every failure is rolled back before
//! the transition, and cancellation can only happen while waiting, after
//! that rollback.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use xfer_store::{StoreError, TransactionalResource};

use crate::classifier::{Classification, ErrorClassifier};
use crate::error::{AttemptError, ExecError, ExecResult};
use crate::ports::{RetryDelay, TokioDelay, UnitOfWork};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded, fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Pause before each retry
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Create a new policy.
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Total attempts allowed (`max_retries + 1`).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

// =============================================================================
// Run Report
// =============================================================================

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Rollbacks issued for failed attempts
    pub rollbacks: u32,
    /// When the first attempt started
    pub started_at: DateTime<Utc>,
    /// When the commit succeeded
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Zero-based index of the attempt that committed
    pub fn successful_attempt(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

// =============================================================================
// State Machine
// =============================================================================

/// State of one retrying run. `attempt` is the zero-based attempt index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// Running the unit of work and committing
    Attempting {
        /// Attempt about to run
        attempt: u32,
    },
    /// Rolled back after a retryable conflict, pausing before the next attempt
    WaitingToRetry {
        /// Attempt that hit the conflict
        attempt: u32,
        /// The conflict
        conflict: StoreError,
    },
    /// Committed
    Succeeded {
        /// Attempt that committed
        attempt: u32,
    },
    /// Terminal failure
    Failed(ExecError),
}

impl AttemptState {
    /// True for `Succeeded` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Succeeded { .. } | AttemptState::Failed(_))
    }
}

/// Transition out of `Attempting` after a failed (and rolled back) attempt.
pub fn after_failure(
    policy: &RetryPolicy,
    classifier: &ErrorClassifier,
    attempt: u32,
    err: AttemptError,
) -> AttemptState {
    match (classifier.classify(&err), err) {
        (Classification::Retryable, AttemptError::Store(conflict)) if attempt < policy.max_retries => {
            AttemptState::WaitingToRetry { attempt, conflict }
        },
        (Classification::Retryable, AttemptError::Store(last)) => {
            AttemptState::Failed(ExecError::RetriesExhausted {
                attempts: attempt.saturating_add(1),
                last,
            })
        },
        (_, source) => AttemptState::Failed(ExecError::Fatal { attempt, source }),
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Executes units of work with bounded retry on concurrency conflicts.
///
/// The executor holds only immutable configuration, so one instance can
/// drive any number of independent resources. A run borrows its resource
/// mutably, which rules out a second transaction on the same resource while
/// the run is in flight.
pub struct RetryingExecutor<D: RetryDelay = TokioDelay> {
    /// Attempt bound and pause
    policy: RetryPolicy,
    /// Retryable/fatal decision
    classifier: ErrorClassifier,
    /// Pause between attempts
    delay: D,
}

impl RetryingExecutor<TokioDelay> {
    /// Create an executor that pauses with a real timer.
    pub fn new(policy: RetryPolicy, classifier: ErrorClassifier) -> Self {
        Self::with_delay(policy, classifier, TokioDelay)
    }
}

impl<D: RetryDelay> RetryingExecutor<D> {
    /// Create an executor with a custom delay.
    pub fn with_delay(policy: RetryPolicy, classifier: ErrorClassifier, delay: D) -> Self {
        Self {
            policy,
            classifier,
            delay,
        }
    }

    /// Get the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Get the error classifier.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Get the delay (for inspection in tests).
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Run `work` on `resource` until it commits or a terminal failure occurs.
    ///
    /// `cancel` interrupts the pause between attempts; it is not checked
    /// while an attempt is running.
    ///
    /// # Errors
    ///
    /// - `ExecError::Fatal` for non-retryable failures (store or input)
    /// - `ExecError::RetriesExhausted` if the last allowed attempt conflicted
    /// - `ExecError::Cancelled` if `cancel` fired during a pause
    pub async fn run<R, W>(
        &self,
        resource: &mut R,
        work: &W,
        cancel: &CancellationToken,
    ) -> ExecResult<RunReport>
    where
        R: TransactionalResource,
        W: UnitOfWork<R>,
    {
        let started_at = Utc::now();
        let mut rollbacks = 0u32;
        let mut state = AttemptState::Attempting { attempt: 0 };

        loop {
            state = match state {
                AttemptState::Attempting { attempt } => {
                    debug!(attempt, max_attempts = self.policy.max_attempts(), "Starting attempt");

                    match attempt_once(&mut *resource, work).await {
                        Ok(()) => AttemptState::Succeeded { attempt },
                        Err(err) => {
                            rollback_quietly(&mut *resource).await;
                            rollbacks += 1;

                            let next = after_failure(&self.policy, &self.classifier, attempt, err);
                            if let AttemptState::WaitingToRetry { conflict, .. } = &next {
                                warn!(
                                    attempt,
                                    code = conflict.code().unwrap_or_default(),
                                    delay_ms = self.policy.retry_delay.as_millis() as u64,
                                    "Retryable conflict, rolled back; retrying"
                                );
                            }
                            next
                        },
                    }
                },

                AttemptState::WaitingToRetry { attempt, .. } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!(attempt, "Retry wait cancelled");
                            AttemptState::Failed(ExecError::Cancelled { attempt })
                        }
                        _ = self.delay.wait(self.policy.retry_delay) => {
                            AttemptState::Attempting { attempt: attempt.saturating_add(1) }
                        }
                    }
                },

                AttemptState::Succeeded { attempt } => {
                    let report = RunReport {
                        attempts: attempt.saturating_add(1),
                        rollbacks,
                        started_at,
                        finished_at: Utc::now(),
                    };
                    if attempt > 0 {
                        info!(attempts = report.attempts, rollbacks, "Committed after retry");
                    }
                    return Ok(report);
                },

                AttemptState::Failed(err) => {
                    debug!(error = %err, rollbacks, "Run failed");
                    return Err(err);
                },
            };
        }
    }
}

/// One attempt: the unit of work followed by commit.
async fn attempt_once<R, W>(resource: &mut R, work: &W) -> Result<(), AttemptError>
where
    R: TransactionalResource,
    W: UnitOfWork<R>,
{
    work.run(resource).await?;
    resource.commit().await?;
    Ok(())
}

/// Roll back, discarding any secondary failure so it cannot mask the original.
async fn rollback_quietly<R: TransactionalResource>(resource: &mut R) {
    if let Err(e) = resource.rollback().await {
        debug!(error = %e, "Rollback failed; discarding secondary error");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransferWork;
    use crate::stub::RecordingDelay;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use xfer_domain::{total_balance, Account, AccountNo, DomainError, TransferRequest};
    use xfer_store::{FaultPoint, MemoryResource, MemoryStore};

    const DELAY: Duration = Duration::from_millis(1000);

    fn executor(max_retries: u32) -> RetryingExecutor<RecordingDelay> {
        RetryingExecutor::with_delay(
            RetryPolicy::new(max_retries, DELAY),
            ErrorClassifier::default(),
            RecordingDelay::new(),
        )
    }

    fn store() -> MemoryStore {
        MemoryStore::with_accounts(vec![
            Account::new(AccountNo::from(1), dec!(100)),
            Account::new(AccountNo::from(2), dec!(200)),
        ])
    }

    fn move_50_from_1_to_2() -> TransferWork {
        TransferWork::new(TransferRequest::parse("1", "2", "50").unwrap())
    }

    fn balances(store: &MemoryStore) -> Vec<rust_decimal::Decimal> {
        store.snapshot().unwrap().into_iter().map(|a| a.balance).collect()
    }

    /// Unit of work that fails before touching the store.
    struct RejectingWork;

    #[async_trait]
    impl UnitOfWork<MemoryResource> for RejectingWork {
        async fn run(&self, _resource: &mut MemoryResource) -> Result<(), AttemptError> {
            Err(DomainError::InvalidAmount("rejected".to_string()).into())
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let store = store();
        let mut conn = store.connect();
        let executor = executor(4);

        let report = executor
            .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.successful_attempt(), 0);
        assert_eq!(report.rollbacks, 0);
        assert_eq!(balances(&store), vec![dec!(50), dec!(250)]);
        assert_eq!(executor.delay().count(), 0);
        assert_eq!(conn.stats().commits, 1);
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_two_conflicts_then_success() {
        let store = store();
        let mut conn = store.connect();
        conn.push_fault(FaultPoint::Execute, StoreError::serialization_failure());
        conn.push_fault(FaultPoint::Execute, StoreError::serialization_failure());
        let executor = executor(4);

        let report = executor
            .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.successful_attempt(), 2);
        assert_eq!(report.rollbacks, 2);
        assert_eq!(conn.stats().rollbacks, 2);
        assert_eq!(executor.delay().waits(), vec![DELAY, DELAY]);
        assert_eq!(balances(&store), vec![dec!(50), dec!(250)]);
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_k_conflicts_then_success_for_every_k() {
        let max_retries = 4;
        for k in 0..=max_retries {
            let store = store();
            let mut conn = store.connect();
            for i in 0..k {
                // Alternate deadlocks and commit-time serialization failures
                if i % 2 == 0 {
                    conn.push_fault(FaultPoint::Execute, StoreError::deadlock());
                } else {
                    conn.push_fault(FaultPoint::Commit, StoreError::serialization_failure());
                }
            }
            let executor = executor(max_retries);

            let report = executor
                .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(report.attempts, k + 1, "k = {}", k);
            assert_eq!(conn.stats().rollbacks, k, "k = {}", k);
            assert_eq!(executor.delay().count(), k as usize, "k = {}", k);
            assert!(executor.delay().waits().iter().all(|d| *d == DELAY));
            assert_eq!(total_balance(&store.snapshot().unwrap()), dec!(300));
            assert!(!conn.in_transaction());
        }
    }

    #[tokio::test]
    async fn test_conflict_on_every_attempt_exhausts_retries() {
        let store = store();
        let mut conn = store.connect();
        for _ in 0..5 {
            conn.push_fault(FaultPoint::Commit, StoreError::serialization_failure());
        }
        let executor = executor(4);

        let err = executor
            .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ExecError::RetriesExhausted {
                attempts: 5,
                last: StoreError::serialization_failure(),
            }
        );
        assert_eq!(executor.delay().count(), 4);
        assert_eq!(conn.stats().rollbacks, 5);
        assert_eq!(conn.stats().commits, 0);
        assert_eq!(balances(&store), vec![dec!(100), dec!(200)]);
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let store = store();
        let mut conn = store.connect();
        conn.push_fault(FaultPoint::Execute, StoreError::deadlock());
        let executor = executor(0);

        let err = executor
            .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(executor.delay().count(), 0);
        assert_eq!(conn.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let store = store();
        let mut conn = store.connect();
        conn.push_fault(FaultPoint::Execute, StoreError::database("23514", "check_violation"));
        let executor = executor(4);

        let err = executor
            .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::Fatal { attempt: 0, .. }));
        assert_eq!(err.store_error().and_then(|e| e.code()), Some("23514"));
        assert_eq!(conn.stats().rollbacks, 1);
        assert_eq!(executor.delay().count(), 0);
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_fatal_after_conflict_stops_retrying() {
        let store = store();
        let mut conn = store.connect();
        conn.push_fault(FaultPoint::Execute, StoreError::deadlock());
        conn.push_fault(FaultPoint::Execute, StoreError::Connection("reset".to_string()));
        let executor = executor(4);

        let err = executor
            .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::Fatal { attempt: 1, .. }));
        assert_eq!(conn.stats().rollbacks, 2);
        assert_eq!(executor.delay().count(), 1);
    }

    #[tokio::test]
    async fn test_non_store_error_is_fatal() {
        let store = store();
        let mut conn = store.connect();
        let executor = executor(4);

        let err = executor
            .run(&mut conn, &RejectingWork, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExecError::Fatal {
                attempt: 0,
                source: AttemptError::Domain(_)
            }
        ));
        assert!(!err.is_store_failure());
        assert_eq!(conn.stats().rollbacks, 1);
        assert_eq!(executor.delay().count(), 0);
    }

    #[tokio::test]
    async fn test_rollback_failure_does_not_mask_original_error() {
        let store = store();
        let mut conn = store.connect();
        conn.push_fault(FaultPoint::Execute, StoreError::database("22003", "numeric_value_out_of_range"));
        conn.push_fault(FaultPoint::Rollback, StoreError::Connection("gone".to_string()));
        let executor = executor(4);

        let err = executor
            .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.store_error().and_then(|e| e.code()), Some("22003"));
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_interrupt_during_wait_cancels() {
        let store = store();
        let mut conn = store.connect();
        conn.push_fault(FaultPoint::Execute, StoreError::serialization_failure());
        let cancel = CancellationToken::new();
        let executor = RetryingExecutor::with_delay(
            RetryPolicy::new(4, DELAY),
            ErrorClassifier::default(),
            RecordingDelay::interrupting(0, cancel.clone()),
        );

        let err = executor.run(&mut conn, &move_50_from_1_to_2(), &cancel).await.unwrap_err();

        assert_eq!(err, ExecError::Cancelled { attempt: 0 });
        assert_eq!(conn.stats().commits, 0);
        assert_eq!(conn.stats().rollbacks, 1);
        assert_eq!(executor.delay().count(), 1);
        assert!(!conn.in_transaction());
        assert_eq!(balances(&store), vec![dec!(100), dec!(200)]);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_does_not_block_first_attempt() {
        let store = store();
        let mut conn = store.connect();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = executor(4).run(&mut conn, &move_50_from_1_to_2(), &cancel).await.unwrap();

        assert_eq!(report.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_real_timer_waits_configured_delay() {
        let store = store();
        let mut conn = store.connect();
        conn.push_fault(FaultPoint::Execute, StoreError::deadlock());
        let executor = RetryingExecutor::new(RetryPolicy::new(4, DELAY), ErrorClassifier::default());
        let start = tokio::time::Instant::now();

        executor
            .run(&mut conn, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(start.elapsed() >= DELAY);
    }

    #[tokio::test]
    async fn test_concurrent_resources_conflict_and_recover() {
        let store = store();
        let mut a = store.connect();
        let mut b = store.connect();

        // b opens a transaction on account 1, then a commits first
        TransferWork::new(TransferRequest::parse("1", "2", "10").unwrap())
            .run(&mut b)
            .await
            .unwrap();
        executor(4)
            .run(&mut a, &move_50_from_1_to_2(), &CancellationToken::new())
            .await
            .unwrap();

        // b's stale commit conflicts
        let err = b.commit().await.unwrap_err();
        assert_eq!(err.code(), Some("40001"));
        b.rollback().await.unwrap();

        // a fresh run on b succeeds against the new state
        let exec = executor(4);
        let report = exec
            .run(
                &mut b,
                &TransferWork::new(TransferRequest::parse("1", "2", "10").unwrap()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(balances(&store), vec![dec!(40), dec!(260)]);
    }

    #[test]
    fn test_after_failure_transitions() {
        let policy = RetryPolicy::new(2, DELAY);
        let classifier = ErrorClassifier::default();

        assert_eq!(
            after_failure(&policy, &classifier, 0, StoreError::deadlock().into()),
            AttemptState::WaitingToRetry {
                attempt: 0,
                conflict: StoreError::deadlock()
            }
        );
        assert_eq!(
            after_failure(&policy, &classifier, 2, StoreError::deadlock().into()),
            AttemptState::Failed(ExecError::RetriesExhausted {
                attempts: 3,
                last: StoreError::deadlock()
            })
        );

        let fatal = after_failure(&policy, &classifier, 1, StoreError::database("42601", "syntax").into());
        assert!(fatal.is_terminal());
        assert!(matches!(fatal, AttemptState::Failed(ExecError::Fatal { attempt: 1, .. })));
    }

    #[test]
    fn test_after_failure_at_attempt_limit_saturates() {
        let policy = RetryPolicy::new(u32::MAX, DELAY);
        let classifier = ErrorClassifier::default();

        assert_eq!(
            after_failure(&policy, &classifier, u32::MAX, StoreError::deadlock().into()),
            AttemptState::Failed(ExecError::RetriesExhausted {
                attempts: u32::MAX,
                last: StoreError::deadlock()
            })
        );
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.retry_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_attempts(), 5);
    }

    #[test]
    fn test_run_report_serialization() {
        let report = RunReport {
            attempts: 3,
            rollbacks: 2,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, report);
    }
}
