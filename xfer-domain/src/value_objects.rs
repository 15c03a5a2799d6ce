//! Value Objects for the xfer domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Account number must be a non-empty identifier
    #[error("Invalid account number: {0}")]
    InvalidAccountNo(String),

    /// Amount must be a finite, non-negative decimal
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

// =============================================================================
// AccountNo
// =============================================================================

/// AccountNo identifies a row in the accounts relation
///
/// # Invariants
/// - Non-empty after trimming surrounding whitespace
/// - Contains no interior whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountNo(String);

impl AccountNo {
    /// Create an AccountNo with validation
    ///
    /// # Examples
    /// ```
    /// # use xfer_domain::value_objects::AccountNo;
    /// let account = AccountNo::new(" 42 ").unwrap();
    /// assert_eq!(account.as_str(), "42");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAccountNo` if empty or contains whitespace
    pub fn new(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = value.as_ref().trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidAccountNo("Account number must not be empty".to_string()));
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidAccountNo(format!(
                "Account number must not contain whitespace: {:?}",
                trimmed
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u32> for AccountNo {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AccountNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Money
// =============================================================================

/// Money is a non-negative decimal amount
///
/// Balances and transfer amounts are fixed-point decimals, never floats.
///
/// # Invariants
/// - Must be >= 0
/// - At most `Money::MAX_SCALE` significant decimal places (the accounts
///   column stores cents, finer amounts would be rounded by the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Decimal places an amount may carry
    pub const MAX_SCALE: u32 = 2;

    /// Create a new Money amount with validation
    ///
    /// Trailing zeros do not count towards the scale: `12.500` is accepted.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAmount` if value < 0 or has more than
    /// two significant decimal places
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!("Amount must not be negative: {}", value)));
        }
        if value.normalize().scale() > Self::MAX_SCALE {
            return Err(DomainError::InvalidAmount(format!(
                "Amount has more than {} decimal places: {}",
                Self::MAX_SCALE,
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    /// Parse user input such as `50`, `12.75` or `1e2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| DomainError::InvalidAmount(format!("Not a number: {:?}", trimmed)))?;
        Self::new(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
