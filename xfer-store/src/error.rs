//! Storage layer errors

use thiserror::Error;

/// SQLSTATE for `deadlock_detected`
pub const SQLSTATE_DEADLOCK: &str = "40P01";

/// SQLSTATE for `serialization_failure`
pub const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE for `numeric_value_out_of_range`
pub const SQLSTATE_NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Errors that can occur in the storage layer
///
/// Store-reported failures keep the store's stable error code so callers
/// can classify them without looking at message text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Failure reported by the store, tagged with its stable error code
    #[error("Database error [{}]: {message}", .code.as_deref().unwrap_or("no code"))]
    Database {
        /// Stable error code (SQLSTATE for PostgreSQL)
        code: Option<String>,
        /// Human-readable message from the store
        message: String,
    },

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (account, table)
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Resource used in a state that does not allow the operation
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state
        message: String,
    },
}

impl StoreError {
    /// Create a store-reported error with a stable code
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Deadlock detected by the store
    pub fn deadlock() -> Self {
        Self::database(SQLSTATE_DEADLOCK, "deadlock detected")
    }

    /// Serialization conflict detected by the store
    pub fn serialization_failure() -> Self {
        Self::database(
            SQLSTATE_SERIALIZATION_FAILURE,
            "could not serialize access due to concurrent update",
        )
    }

    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Stable error code, if the store supplied one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity_type: "unknown".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => StoreError::Database {
                code: db_err.code().map(|c| c.into_owned()),
                message: db_err.message().to_string(),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Connection(err.to_string()),
            _ => StoreError::Database {
                code: None,
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_exposed_for_database_errors() {
        assert_eq!(StoreError::deadlock().code(), Some("40P01"));
        assert_eq!(StoreError::serialization_failure().code(), Some("40001"));
        assert_eq!(StoreError::database("23505", "duplicate key").code(), Some("23505"));
    }

    #[test]
    fn test_code_is_absent_for_other_errors() {
        assert_eq!(StoreError::Connection("reset".to_string()).code(), None);
        assert_eq!(StoreError::not_found("account", "7").code(), None);
        let uncoded = StoreError::Database {
            code: None,
            message: "boom".to_string(),
        };
        assert_eq!(uncoded.code(), None);
    }

    #[test]
    fn test_display_includes_code() {
        let err = StoreError::database("40001", "conflict");
        assert_eq!(err.to_string(), "Database error [40001]: conflict");

        let uncoded = StoreError::Database {
            code: None,
            message: "boom".to_string(),
        };
        assert_eq!(uncoded.to_string(), "Database error [no code]: boom");
    }
}
