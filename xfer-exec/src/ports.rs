//! Execution layer port definitions.
//!
//! Ports define what the executor needs from the outside: the unit of work
//! to run inside a transaction, and the pause between attempts.

use std::time::Duration;

use async_trait::async_trait;
use xfer_store::TransactionalResource;

use crate::error::AttemptError;

// =============================================================================
// Unit of Work Port
// =============================================================================

/// The bounded sequence of store operations run under one transaction attempt.
///
/// `run` must only issue operations; the executor owns commit and rollback.
/// It may be invoked several times for one logical request, once per attempt.
///
/// Implementations:
/// - `TransferWork` - Debit/credit pair for a balance transfer
#[async_trait]
pub trait UnitOfWork<R: TransactionalResource>: Send + Sync {
    /// Issue the operations of one attempt on `resource`.
    async fn run(&self, resource: &mut R) -> Result<(), AttemptError>;
}

// =============================================================================
// Retry Delay Port
// =============================================================================

/// Pause between a rolled-back attempt and the next one.
///
/// The executor races this against cancellation, so implementations only
/// need to complete after `duration`.
///
/// Implementations:
/// - `TokioDelay` - Real timer
/// - `RecordingDelay` - For testing (records durations, returns at once)
#[async_trait]
pub trait RetryDelay: Send + Sync {
    /// Wait for `duration`.
    async fn wait(&self, duration: Duration);
}

/// Timer-backed delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl RetryDelay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
