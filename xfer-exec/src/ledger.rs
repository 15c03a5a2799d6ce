//! Ledger operations: the balance-transfer unit of work.
//!
//! No balance-sufficiency check and no self-transfer guard are applied;
//! both are left to callers.

use async_trait::async_trait;
use tracing::debug;

use xfer_domain::{AccountNo, Money, TransferRequest};
use xfer_store::{Operation, TransactionalResource};

use crate::error::AttemptError;
use crate::ports::UnitOfWork;

/// Debit `from` and credit `to` by `amount` inside the open transaction.
///
/// Stops at the first failing statement and returns its error. Nothing is
/// committed here; atomicity comes from the caller committing both writes
/// together or rolling both back.
pub async fn transfer<R: TransactionalResource>(
    resource: &mut R,
    from: &AccountNo,
    to: &AccountNo,
    amount: Money,
) -> Result<(), AttemptError> {
    let debit = Operation::Debit {
        account: from.clone(),
        amount,
    };
    let credit = Operation::Credit {
        account: to.clone(),
        amount,
    };

    let debited = resource.execute(&debit).await?;
    let credited = resource.execute(&credit).await?;

    debug!(%from, %to, %amount, debited, credited, "Transfer statements issued");
    Ok(())
}

/// Unit of work moving money for one `TransferRequest`.
#[derive(Debug, Clone)]
pub struct TransferWork {
    request: TransferRequest,
}

impl TransferWork {
    /// Bind a request to the ledger transfer.
    pub fn new(request: TransferRequest) -> Self {
        Self { request }
    }

    /// The bound request
    pub fn request(&self) -> &TransferRequest {
        &self.request
    }
}

#[async_trait]
impl<R: TransactionalResource> UnitOfWork<R> for TransferWork {
    async fn run(&self, resource: &mut R) -> Result<(), AttemptError> {
        transfer(resource, &self.request.from, &self.request.to, self.request.amount).await
    }
}

// =============================================================================
// Tests
// =============================================================================
