//! xfer Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains account entities, transfer requests and value objects.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{seed_accounts, total_balance, Account, TransferId, TransferRequest};
pub use value_objects::{AccountNo, DomainError, Money};
