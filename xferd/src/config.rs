//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use std::env;
use std::time::Duration;
use xfer_exec::{ErrorClassifier, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use xfer_store::{SQLSTATE_DEADLOCK, SQLSTATE_SERIALIZATION_FAILURE};

/// Default number of seeded accounts.
pub const DEFAULT_SEED_ACCOUNTS: u32 = 9;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store configuration
    pub store: StoreConfig,

    /// Retry configuration
    pub retry: RetryConfig,

    /// Number of accounts seeded at startup (balances 100, 200, ...)
    pub seed_accounts: u32,
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Which backend holds the accounts
    pub backend: StoreBackend,
    /// Connection URL (postgres backend only)
    pub database_url: Option<String>,
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// Error codes treated as retryable conflicts
    pub retryable_codes: Vec<String>,
}

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process versioned store
    Memory,
    /// PostgreSQL at SERIALIZABLE isolation
    Postgres,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let store = Self::load_store_config()?;
        let retry = Self::load_retry_config()?;
        let seed_accounts = Self::load_u32_env("XFER_SEED_ACCOUNTS", DEFAULT_SEED_ACCOUNTS)?;

        Ok(Self { store, retry, seed_accounts })
    }

    /// Create test configuration (memory store, no pause between attempts).
    pub fn test() -> Self {
        Self {
            retry: RetryConfig {
                retry_delay: Duration::ZERO,
                ..RetryConfig::default()
            },
            ..Self::default()
        }
    }

    /// Retry policy for the executor.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_retries, self.retry.retry_delay)
    }

    /// Error classifier built from the configured retryable codes.
    pub fn classifier(&self) -> ErrorClassifier {
        ErrorClassifier::new(self.retry.retryable_codes.iter())
    }

    fn load_store_config() -> DaemonResult<StoreConfig> {
        let backend_str = env::var("XFER_STORE").unwrap_or_else(|_| "memory".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "memory" | "mem" => StoreBackend::Memory,
            "postgres" | "pg" => StoreBackend::Postgres,
            other => {
                return Err(DaemonError::Config(format!(
                    "Invalid XFER_STORE: {}. Expected: memory, postgres",
                    other
                )))
            },
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());

        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(DaemonError::Config(
                "DATABASE_URL is required when XFER_STORE=postgres".to_string(),
            ));
        }

        Ok(StoreConfig { backend, database_url })
    }

    fn load_retry_config() -> DaemonResult<RetryConfig> {
        let max_retries = Self::load_u32_env("XFER_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;

        let delay_ms =
            Self::load_u32_env("XFER_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY.as_millis() as u32)?;

        let retryable_codes = match env::var("XFER_RETRYABLE_CODES") {
            Ok(val) => parse_codes(&val)?,
            Err(_) => default_codes(),
        };

        Ok(RetryConfig {
            max_retries,
            retry_delay: Duration::from_millis(u64::from(delay_ms)),
            retryable_codes,
        })
    }

    fn load_u32_env(key: &str, default: u32) -> DaemonResult<u32> {
        match env::var(key) {
            Ok(val) => val
                .trim()
                .parse::<u32>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

/// Parse a comma-separated list of error codes.
fn parse_codes(raw: &str) -> DaemonResult<Vec<String>> {
    let codes: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_uppercase)
        .collect();

    if codes.is_empty() {
        return Err(DaemonError::Config(format!(
            "Invalid XFER_RETRYABLE_CODES value: {:?}",
            raw
        )));
    }

    Ok(codes)
}

fn default_codes() -> Vec<String> {
    vec![
        SQLSTATE_DEADLOCK.to_string(),
        SQLSTATE_SERIALIZATION_FAILURE.to_string(),
    ]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            retryable_codes: default_codes(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
            },
            retry: RetryConfig::default(),
            seed_accounts: DEFAULT_SEED_ACCOUNTS,
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_exec::Classification;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.seed_accounts, 9);
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.retry.retry_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.retry.retry_delay, Duration::ZERO);
        assert_eq!(config.retry_policy().max_attempts(), 5);
    }

    #[test]
    fn test_default_classifier_is_postgres() {
        let classifier = Config::default().classifier();

        assert_eq!(classifier.classify_code(Some("40P01")), Classification::Retryable);
        assert_eq!(classifier.classify_code(Some("40001")), Classification::Retryable);
        assert_eq!(classifier.classify_code(Some("23505")), Classification::Fatal);
        assert_eq!(classifier.classify_code(None), Classification::Fatal);
    }

    #[test]
    fn test_parse_codes() {
        let codes = parse_codes(" 61000, 72000 ,,").unwrap();
        assert_eq!(codes, vec!["61000".to_string(), "72000".to_string()]);

        let codes = parse_codes("40p01").unwrap();
        assert_eq!(codes, vec!["40P01".to_string()]);

        assert!(matches!(parse_codes(" , "), Err(DaemonError::Config(_))));
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(StoreBackend::Memory.to_string(), "memory");
        assert_eq!(StoreBackend::Postgres.to_string(), "postgres");
    }
}
