//! Domain Entities for xfer
//!
//! Accounts and the transfer requests that move money between them.

use crate::value_objects::{AccountNo, DomainError, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a TransferRequest
pub type TransferId = Uuid;

// =============================================================================
// Account
// =============================================================================

/// Account is one row of the accounts relation.
///
/// The balance is a raw Decimal rather than `Money`: the ledger applies no
/// sufficiency check, so a balance may legitimately go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub account_no: AccountNo,
    /// Current balance
    pub balance: Decimal,
}

impl Account {
    /// Create a new account
    pub fn new(account_no: AccountNo, balance: Decimal) -> Self {
        Self { account_no, balance }
    }
}

/// Build the default seed: accounts `1..=count`, account `i` holding `100 * i`.
pub fn seed_accounts(count: u32) -> Vec<Account> {
    (1..=count)
        .map(|i| Account::new(AccountNo::from(i), Decimal::from(100) * Decimal::from(i)))
        .collect()
}

/// Sum of all balances (conservation checks)
///
/// Saturates at the `Decimal` range instead of panicking.
pub fn total_balance(accounts: &[Account]) -> Decimal {
    accounts
        .iter()
        .fold(Decimal::ZERO, |total, a| total.saturating_add(a.balance))
}

// =============================================================================
// TransferRequest
// =============================================================================

/// A request to move `amount` from one account to another.
///
/// `from == to` is accepted: a self-transfer debits and credits the same
/// row and leaves its balance unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Correlation ID for logs
    pub id: TransferId,
    /// Account to debit
    pub from: AccountNo,
    /// Account to credit
    pub to: AccountNo,
    /// Amount moved
    pub amount: Money,
}

impl TransferRequest {
    /// Create a new transfer request with a fresh time-ordered ID
    pub fn new(from: AccountNo, to: AccountNo, amount: Money) -> Self {
        Self {
            id: Uuid::now_v7(),
            from,
            to,
            amount,
        }
    }

    /// Parse raw user input fields into a request
    ///
    /// # Errors
    /// Returns `DomainError` if either account number or the amount is invalid
    pub fn parse(from: &str, to: &str, amount: &str) -> Result<Self, DomainError> {
        Ok(Self::new(AccountNo::new(from)?, AccountNo::new(to)?, amount.parse()?))
    }

    /// True if debit and credit target the same account
    pub fn is_self_transfer(&self) -> bool {
        self.from == self.to
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_seed_accounts() {
        let accounts = seed_accounts(9);

        assert_eq!(accounts.len(), 9);
        assert_eq!(accounts[0], Account::new(AccountNo::from(1), dec!(100)));
        assert_eq!(accounts[8], Account::new(AccountNo::from(9), dec!(900)));
        assert_eq!(total_balance(&accounts), dec!(4500));
    }

    #[test]
    fn test_total_balance_saturates() {
        let accounts = vec![
            Account::new(AccountNo::from(1), Decimal::MAX),
            Account::new(AccountNo::from(2), dec!(1)),
        ];

        assert_eq!(total_balance(&accounts), Decimal::MAX);
    }

    #[test]
    fn test_seed_accounts_empty() {
        assert!(seed_accounts(0).is_empty());
    }

    #[test]
    fn test_transfer_request_parse() {
        let request = TransferRequest::parse("1", " 2 ", "50").unwrap();

        assert_eq!(request.from.as_str(), "1");
        assert_eq!(request.to.as_str(), "2");
        assert_eq!(request.amount.as_decimal(), dec!(50));
        assert!(!request.is_self_transfer());
    }

    #[test]
    fn test_transfer_request_parse_errors() {
        assert!(matches!(
            TransferRequest::parse("1", "", "50"),
            Err(DomainError::InvalidAccountNo(_))
        ));
        assert!(matches!(
            TransferRequest::parse("1", "2", "abc"),
            Err(DomainError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_self_transfer_is_permitted() {
        let request = TransferRequest::parse("3", "3", "10").unwrap();
        assert!(request.is_self_transfer());
    }

    #[test]
    fn test_transfer_ids_are_unique() {
        let a = TransferRequest::parse("1", "2", "1").unwrap();
        let b = TransferRequest::parse("1", "2", "1").unwrap();
        assert_ne!(a.id, b.id);
    }
}
