//! xfer Daemon Library
//!
//! Interactive balance-transfer session over a serializable store.
//!
//! # Architecture
//!
//! ```text
//! Console → Transfer Workflow → Retrying Executor → Resource (memory | PostgreSQL)
//!                 ↓
//!          Balance Reporter
//! ```
//!
//! # Components
//!
//! - **Daemon**: Bootstraps the store and runs one session
//! - **Workflow**: Sequential request loop with per-request retry
//! - **Input**: Request sources (console prompts)
//! - **Display**: Progress lines and the balance table
//! - **Config**: Environment-based configuration
//! - **Runtime**: Tokio runtime that does not wait on blocked console reads
//!
//! # Example
//!
//! ```rust,ignore
//! use xferd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod daemon;
pub mod display;
pub mod error;
pub mod input;
pub mod runtime;
pub mod workflow;

// Re-exports for convenience
pub use config::{Config, RetryConfig, StoreBackend, StoreConfig, DEFAULT_SEED_ACCOUNTS};
pub use daemon::Daemon;
pub use display::{render_table, BalanceReporter};
pub use error::{DaemonError, DaemonResult, EXIT_INTERRUPTED, EXIT_OTHER, EXIT_STORE_FAILURE};
pub use input::{ConsoleSource, SourceEvent, TransferSource};
pub use runtime::block_on_detached;
pub use workflow::{TransferWorkflow, WorkflowSummary};
