//! Daemon error types.

use thiserror::Error;
use xfer_domain::DomainError;
use xfer_exec::ExecError;
use xfer_store::StoreError;

/// Exit code for store failures (fatal store error or exhausted retries).
pub const EXIT_STORE_FAILURE: i32 = 1;

/// Exit code for a user interrupt.
pub const EXIT_INTERRUPTED: i32 = 2;

/// Exit code for any other error.
pub const EXIT_OTHER: i32 = 3;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Execution error
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Database bootstrap or status check failed
    #[error("Database setup error: {0}")]
    Bootstrap(String),

    /// Reading requests or writing output failed
    #[error("Input error: {0}")]
    Input(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// User interrupted the session
    #[error("Interrupted by user")]
    Interrupted,
}

impl DaemonError {
    /// Process exit code for this error.
    ///
    /// Store failures, user interrupts and everything else map to distinct codes.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Exec(ExecError::Cancelled { .. }) | DaemonError::Interrupted => EXIT_INTERRUPTED,
            DaemonError::Exec(e) if e.is_store_failure() => EXIT_STORE_FAILURE,
            DaemonError::Store(_) | DaemonError::Bootstrap(_) => EXIT_STORE_FAILURE,
            _ => EXIT_OTHER,
        }
    }
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
