//! Admin configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use competition_engine::db::DatabaseConfig;
use std::time::Duration;

/// Complete admin configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Capacity of the in-process notification channel
    pub notify_channel_capacity: usize,
    /// Bound on single store reads
    pub query_timeout: Duration,
    /// Bound on long rebuilds such as discipline recomputation
    pub long_operation_timeout: Duration,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but does not parse
    pub fn from_env(database_url_override: Option<String>) -> Result<Self, ConfigError> {
        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| DatabaseConfig::development().database_url);

        let database = DatabaseConfig {
            database_url,
            max_connections: parse_env_or("DB_MAX_CONNECTIONS", 5)?,
            min_connections: parse_env_or("DB_MIN_CONNECTIONS", 1)?,
            connection_timeout_secs: parse_env_or("DB_CONNECTION_TIMEOUT_SECS", 5)?,
            idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT_SECS", 300)?,
            max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME_SECS", 1800)?,
        };

        Ok(AdminConfig {
            database,
            notify_channel_capacity: parse_env_or("NOTIFY_CHANNEL_CAPACITY", 256)?,
            query_timeout: Duration::from_secs(parse_env_or("QUERY_TIMEOUT_SECS", 5)?),
            long_operation_timeout: Duration::from_secs(parse_env_or(
                "LONG_OPERATION_TIMEOUT_SECS",
                30,
            )?),
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.database_url.is_empty() {
            return Err(ConfigError::Invalid {
                var: "DATABASE_URL".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        if self.notify_channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "NOTIFY_CHANNEL_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.query_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "QUERY_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.long_operation_timeout < self.query_timeout {
            return Err(ConfigError::Invalid {
                var: "LONG_OPERATION_TIMEOUT_SECS".to_string(),
                reason: format!(
                    "Must be at least the query timeout ({}s)",
                    self.query_timeout.as_secs()
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Cannot parse {value:?}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdminConfig {
        AdminConfig {
            database: DatabaseConfig {
                database_url: "postgres://localhost/competition_test".to_string(),
                max_connections: 5,
                min_connections: 1,
                connection_timeout_secs: 5,
                idle_timeout_secs: 300,
                max_lifetime_secs: 1800,
            },
            notify_channel_capacity: 64,
            query_timeout: Duration::from_secs(5),
            long_operation_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "QUERY_TIMEOUT_SECS".to_string(),
            reason: "Cannot parse \"soon\"".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("QUERY_TIMEOUT_SECS"));
        assert!(msg.contains("soon"));
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_min_above_max() {
        let mut config = config();
        config.database.min_connections = 10;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "DB_MIN_CONNECTIONS"));
    }

    #[test]
    fn test_config_validation_zero_capacity() {
        let mut config = config();
        config.notify_channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_long_timeout_too_short() {
        let mut config = config();
        config.long_operation_timeout = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_url_override_wins() {
        let config = AdminConfig::from_env(Some("postgres://override/db".to_string())).unwrap();
        assert_eq!(config.database.database_url, "postgres://override/db");
    }
}
