use std::time::Duration;

use kazi_core::AppError;

/// Configuration for the database connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long a query may wait for a free pooled connection.
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Read configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, defaults to 5)
    /// - `DATABASE_ACQUIRE_TIMEOUT_SECS` (optional, defaults to 10)
    pub fn from_env() -> Result<Self, AppError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| {
            AppError::ConfigError("DATABASE_URL not set. Required to store opportunities.".into())
        })?;

        let max_connections = positive_var("DATABASE_MAX_CONNECTIONS", 5)?;
        let acquire_timeout = positive_var("DATABASE_ACQUIRE_TIMEOUT_SECS", 10)?;

        Ok(Self {
            url,
            max_connections,
            acquire_timeout: Duration::from_secs(u64::from(acquire_timeout)),
        })
    }
}

/// Parse an optional positive integer variable, falling back to `default`.
fn positive_var(name: &str, default: u32) -> Result<u32, AppError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => parse_positive(name, &raw),
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u32, AppError> {
    let parsed: u32 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {name} '{raw}': must be a positive integer"))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{name} must be at least 1")));
    }
    Ok(parsed)
}
