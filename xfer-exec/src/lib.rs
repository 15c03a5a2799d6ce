//! xfer Execution Layer
//!
//! Serializable transactions with bounded retry on concurrency conflicts.
//!
//! # Architecture
//!
//! ```text
//! Unit of Work → Executor → Resource (execute, commit | rollback) → Classifier → retry / fail
//! ```
//!
//! # Components
//!
//! - **Classifier**: Retryable vs fatal, from the store's stable error code
//! - **Executor**: Retry state machine (attempt, rollback, wait, give up)
//! - **Ledger**: The debit/credit transfer unit of work
//! - **Ports**: Traits for the unit of work and the inter-attempt delay
//! - **Stub**: Test implementations for development
//!
//! # Example
//!
//! ```rust
//! use xfer_domain::{seed_accounts, TransferRequest};
//! use xfer_exec::{ErrorClassifier, RetryPolicy, RetryingExecutor, TransferWork};
//! use xfer_store::MemoryStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::with_accounts(seed_accounts(2));
//!     let mut conn = store.connect();
//!     let executor = RetryingExecutor::new(RetryPolicy::default(), ErrorClassifier::postgres());
//!
//!     let work = TransferWork::new(TransferRequest::parse("1", "2", "50").unwrap());
//!     let report = executor.run(&mut conn, &work, &CancellationToken::new()).await.unwrap();
//!
//!     assert_eq!(report.attempts, 1);
//! }
//! ```

#![warn(clippy::all)]

pub mod classifier;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod ports;
pub mod stub;

// Re-exports for convenience
pub use classifier::{Classification, ErrorClassifier};
pub use error::{AttemptError, ExecError, ExecResult};
pub use executor::{
    after_failure, AttemptState, RetryPolicy, RetryingExecutor, RunReport, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY,
};
pub use ledger::{transfer, TransferWork};
pub use ports::{RetryDelay, TokioDelay, UnitOfWork};
pub use stub::RecordingDelay;
