//! Execution layer error types.

use thiserror::Error;
use xfer_domain::DomainError;
use xfer_store::StoreError;

/// Failure raised inside a single transaction attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// Store reported a failure (possibly a retryable conflict)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unit of work rejected its input before or between store calls
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Terminal outcome of a failed retrying run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    /// Non-retryable failure; rolled back and surfaced without retry
    #[error("Fatal error on attempt {attempt}: {source}")]
    Fatal {
        /// Zero-based attempt index the failure occurred on
        attempt: u32,
        /// The failure itself
        #[source]
        source: AttemptError,
    },

    /// Retryable conflict on the last allowed attempt
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total attempts made
        attempts: u32,
        /// Conflict reported by the final attempt
        last: StoreError,
    },

    /// Cancelled while waiting between attempts; nothing is left open
    #[error("Cancelled while waiting to retry after attempt {attempt}")]
    Cancelled {
        /// Zero-based index of the attempt that preceded the wait
        attempt: u32,
    },
}

impl ExecError {
    /// True if the store itself caused the failure (fatal store error or
    /// exhausted retries), as opposed to cancellation or invalid input.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            ExecError::Fatal {
                source: AttemptError::Store(_),
                ..
            } | ExecError::RetriesExhausted { .. }
        )
    }

    /// The store error behind this failure, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ExecError::Fatal {
                source: AttemptError::Store(err),
                ..
            } => Some(err),
            ExecError::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
