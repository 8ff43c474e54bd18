use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Config for a given connection string with default pool settings
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(AppError::Configuration(
                "database connection string must not be empty".to_string(),
            ));
        }
        Ok(Self {
            url,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        })
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `DATABASE_URL` is required; its absence is a startup error rather than
    /// something each connection attempt rediscovers.
    pub fn from_env() -> AppResult<Self> {
        let url = env::var("DATABASE_URL").map_err(|_| {
            AppError::Configuration("DATABASE_URL environment variable is not set".to_string())
        })?;

        let mut database = DatabaseConfig::new(url)?;
        database.max_connections = parse_env("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        database.acquire_timeout_secs =
            parse_env("DB_ACQUIRE_TIMEOUT_SECS", DEFAULT_ACQUIRE_TIMEOUT_SECS)?;

        Ok(Self { database })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::Configuration(format!("{} has an invalid value: {:?}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}
