//! Retryable/fatal classification of attempt failures.
//!
//! Classification is a pure function of the store's stable error code.
//! Message text is never inspected.

use std::collections::BTreeSet;

use xfer_store::{SQLSTATE_DEADLOCK, SQLSTATE_SERIALIZATION_FAILURE};

use crate::error::AttemptError;

/// Oracle code surfaced for deadlocks
pub const ORACLE_DEADLOCK: &str = "61000";

/// Oracle code surfaced for snapshot-isolation serialization errors
pub const ORACLE_SERIALIZATION_FAILURE: &str = "72000";

/// What the executor should do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Transient concurrency conflict; roll back and try again
    Retryable,
    /// Anything else; roll back and give up
    Fatal,
}

/// Decides whether a failure is a transient concurrency conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    retryable_codes: BTreeSet<String>,
}

impl ErrorClassifier {
    /// Classifier treating exactly `codes` as retryable.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            retryable_codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// PostgreSQL: `deadlock_detected` and `serialization_failure`.
    pub fn postgres() -> Self {
        Self::new([SQLSTATE_DEADLOCK, SQLSTATE_SERIALIZATION_FAILURE])
    }

    /// Oracle: deadlock and snapshot-isolation serialization error.
    pub fn oracle() -> Self {
        Self::new([ORACLE_DEADLOCK, ORACLE_SERIALIZATION_FAILURE])
    }

    /// Codes treated as retryable
    pub fn retryable_codes(&self) -> impl Iterator<Item = &str> {
        self.retryable_codes.iter().map(String::as_str)
    }

    /// Classify a bare store code.
    pub fn classify_code(&self, code: Option<&str>) -> Classification {
        match code {
            Some(code) if self.retryable_codes.contains(code) => Classification::Retryable,
            _ => Classification::Fatal,
        }
    }

    /// Classify an attempt failure. Non-store failures are always fatal.
    pub fn classify(&self, err: &AttemptError) -> Classification {
        match err {
            AttemptError::Store(store_err) => self.classify_code(store_err.code()),
            AttemptError::Domain(_) => Classification::Fatal,
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::postgres()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_domain::DomainError;
    use xfer_store::StoreError;

    #[test]
    fn test_default_retries_deadlock_and_serialization() {
        let classifier = ErrorClassifier::default();

        assert_eq!(
            classifier.classify(&StoreError::deadlock().into()),
            Classification::Retryable
        );
        assert_eq!(
            classifier.classify(&StoreError::serialization_failure().into()),
            Classification::Retryable
        );
    }

    #[test]
    fn test_other_store_errors_are_fatal() {
        let classifier = ErrorClassifier::default();

        for err in [
            StoreError::database("23505", "unique_violation"),
            StoreError::database("42P01", "undefined_table"),
            StoreError::database("53200", "out_of_memory"),
            StoreError::Connection("connection reset".to_string()),
            StoreError::Database {
                code: None,
                message: "deadlock detected".to_string(),
            },
        ] {
            assert_eq!(classifier.classify(&err.into()), Classification::Fatal);
        }
    }

    #[test]
    fn test_message_text_is_ignored() {
        let classifier = ErrorClassifier::default();
        let misleading = StoreError::database("XX000", "could not serialize access: deadlock");

        assert_eq!(classifier.classify(&misleading.into()), Classification::Fatal);
    }

    #[test]
    fn test_domain_errors_are_fatal() {
        let classifier = ErrorClassifier::default();
        let err = AttemptError::Domain(DomainError::InvalidAmount("-1".to_string()));

        assert_eq!(classifier.classify(&err), Classification::Fatal);
    }

    #[test]
    fn test_custom_codes() {
        let classifier = ErrorClassifier::oracle();

        assert_eq!(classifier.classify_code(Some("61000")), Classification::Retryable);
        assert_eq!(classifier.classify_code(Some("72000")), Classification::Retryable);
        assert_eq!(classifier.classify_code(Some("40001")), Classification::Fatal);
        assert_eq!(classifier.classify_code(None), Classification::Fatal);
        assert_eq!(classifier.retryable_codes().collect::<Vec<_>>(), vec!["61000", "72000"]);
    }

    #[test]
    fn test_empty_code_set_never_retries() {
        let classifier = ErrorClassifier::new(Vec::<String>::new());
        assert_eq!(classifier.classify_code(Some("40001")), Classification::Fatal);
    }
}
