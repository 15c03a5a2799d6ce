//! Transactional resource trait (Port)
//!
//! A `TransactionalResource` is one logical connection to a store that
//! supports serializable transactions. The first operation after a commit
//! or rollback implicitly opens a new transaction, which then stays open
//! (uncommitted) until the caller commits or rolls back.

use crate::error::StoreError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use xfer_domain::{Account, AccountNo, Money};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A write against the accounts relation.
///
/// This is a closed set on purpose: the resource is not a general SQL layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Subtract `amount` from the balance of `account`
    Debit {
        /// Account to debit
        account: AccountNo,
        /// Amount to subtract
        amount: Money,
    },
    /// Add `amount` to the balance of `account`
    Credit {
        /// Account to credit
        account: AccountNo,
        /// Amount to add
        amount: Money,
    },
}

impl Operation {
    /// Account the operation touches
    pub fn account(&self) -> &AccountNo {
        match self {
            Operation::Debit { account, .. } | Operation::Credit { account, .. } => account,
        }
    }

    /// Signed balance change applied by the operation
    pub fn delta(&self) -> Decimal {
        match self {
            Operation::Debit { amount, .. } => -amount.as_decimal(),
            Operation::Credit { amount, .. } => amount.as_decimal(),
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Debit { .. } => "debit",
            Operation::Credit { .. } => "credit",
        }
    }
}

/// One logical connection to a serializable transactional store.
///
/// Implementations:
/// - `MemoryResource` - In-process store for tests and development
/// - `PgResource` - PostgreSQL connection (feature `postgres`)
///
/// Isolation is fixed to SERIALIZABLE when the resource is created.
#[async_trait]
pub trait TransactionalResource: Send {
    /// Execute an operation inside the current transaction, opening one if needed.
    ///
    /// Returns the number of rows affected. An operation on an unknown
    /// account affects zero rows and is not an error.
    async fn execute(&mut self, operation: &Operation) -> StoreResult<u64>;

    /// Read all accounts inside the current transaction, opening one if needed.
    async fn accounts(&mut self) -> StoreResult<Vec<Account>>;

    /// Commit the open transaction.
    ///
    /// Committing with no open transaction is a no-op.
    async fn commit(&mut self) -> StoreResult<()>;

    /// Roll back the open transaction.
    ///
    /// After this returns, successfully or not, no transaction is open.
    async fn rollback(&mut self) -> StoreResult<()>;

    /// Whether a transaction is currently open
    fn in_transaction(&self) -> bool;
}

/// Order accounts so numeric identifiers sort naturally (2 before 10).
pub(crate) fn sort_accounts(accounts: &mut [Account]) {
    accounts.sort_by(|a, b| {
        let (a, b) = (a.account_no.as_str(), b.account_no.as_str());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    });
}
