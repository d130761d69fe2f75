//! Store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COGS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `COGS_DB_MAX_CONNECTIONS` - Pool size ceiling (default: 10)
//! - `COGS_DB_MIN_CONNECTIONS` - Idle connections kept open (default: 1)
//! - `COGS_DB_ACQUIRE_TIMEOUT_SECS` - Seconds to wait for a pooled connection (default: 10)
//! - `COGS_MAX_COMMIT_ATTEMPTS` - Commit retries after a stale read (default: 3)

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use fuelcost_engine::EngineConfig;
use fuelcost_engine::engine::DEFAULT_MAX_COMMIT_ATTEMPTS;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Database and commit settings.
///
/// Implements `Debug` manually to redact the connection string.
#[derive(Clone)]
pub struct StoreConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Minimum idle connections
    pub min_connections: u32,
    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Commit rounds before giving up on a moving ledger
    pub max_commit_attempts: u32,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("max_commit_attempts", &self.max_commit_attempts)
            .finish()
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or a numeric
    /// setting does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("COGS_DATABASE_URL")
            .or_else(|| get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("COGS_DATABASE_URL".to_string()))?;

        let max_connections = parse_or_default(
            &get,
            "COGS_DB_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let min_connections = parse_or_default(
            &get,
            "COGS_DB_MIN_CONNECTIONS",
            DEFAULT_MIN_CONNECTIONS,
        )?;
        if min_connections > max_connections {
            return Err(ConfigError::InvalidEnvVar(
                "COGS_DB_MIN_CONNECTIONS".to_string(),
                format!("must not exceed COGS_DB_MAX_CONNECTIONS ({max_connections})"),
            ));
        }
        let acquire_timeout = Duration::from_secs(parse_or_default(
            &get,
            "COGS_DB_ACQUIRE_TIMEOUT_SECS",
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?);
        let max_commit_attempts = parse_or_default(
            &get,
            "COGS_MAX_COMMIT_ATTEMPTS",
            DEFAULT_MAX_COMMIT_ATTEMPTS,
        )?;
        if max_commit_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "COGS_MAX_COMMIT_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            min_connections,
            acquire_timeout,
            max_commit_attempts,
        })
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub const fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_commit_attempts: self.max_commit_attempts,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or_default<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StoreConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StoreConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("COGS_DATABASE_URL", "postgres://localhost/cogs")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://localhost/cogs");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.max_commit_attempts, 3);
        assert_eq!(config.engine_config().max_commit_attempts, 3);
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fallback/db")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/db");

        let config = load(&[
            ("COGS_DATABASE_URL", "postgres://primary/db"),
            ("DATABASE_URL", "postgres://fallback/db"),
        ])
        .unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://primary/db");
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "COGS_DATABASE_URL"));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = load(&[
            ("COGS_DATABASE_URL", "postgres://localhost/cogs"),
            ("COGS_DB_MAX_CONNECTIONS", "lots"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "COGS_DB_MAX_CONNECTIONS"));

        let err = load(&[
            ("COGS_DATABASE_URL", "postgres://localhost/cogs"),
            ("COGS_MAX_COMMIT_ATTEMPTS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));

        let err = load(&[
            ("COGS_DATABASE_URL", "postgres://localhost/cogs"),
            ("COGS_DB_MAX_CONNECTIONS", "2"),
            ("COGS_DB_MIN_CONNECTIONS", "5"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "COGS_DB_MIN_CONNECTIONS"));
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = load(&[("COGS_DATABASE_URL", "postgres://user:hunter2@db/cogs")]).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
