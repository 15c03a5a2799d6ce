//! xfer Storage Layer
//!
//! Transactional resources for balance transfers.
//!
//! # Architecture
//!
//! - **TransactionalResource**: One logical serializable connection (port)
//! - **In-memory store**: Versioned accounts with scripted faults, for tests
//! - **PostgreSQL resource**: Production implementation (feature `postgres`)
//!
//! # Usage
//!
//! ```rust
//! use xfer_store::{MemoryStore, Operation, TransactionalResource};
//! use xfer_domain::{seed_accounts, AccountNo, Money};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::with_accounts(seed_accounts(2));
//!     let mut conn = store.connect();
//!
//!     let op = Operation::Credit {
//!         account: AccountNo::from(1),
//!         amount: Money::new(Decimal::from(5)).unwrap(),
//!     };
//!     conn.execute(&op).await.unwrap();
//!     conn.commit().await.unwrap();
//!
//!     assert!(!conn.in_transaction());
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod resource;

// Re-exports
pub use error::{StoreError, SQLSTATE_DEADLOCK, SQLSTATE_NUMERIC_OUT_OF_RANGE, SQLSTATE_SERIALIZATION_FAILURE};
pub use memory::{FaultPoint, MemoryResource, MemoryStore, ResourceStats};
#[cfg(feature = "postgres")]
pub use postgres::PgResource;
pub use resource::{Operation, StoreResult, TransactionalResource};
