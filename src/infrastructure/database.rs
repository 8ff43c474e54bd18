// Database handle - SQLite pool holding one table per collection.
// Each row keeps the JSON document plus the columns its indexes need.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::schemas::{collection_ddl, BookingSchema, EventSchema};

/// Shared handle to the document store. Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for the configured connection string
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AppError::Connection(format!("Invalid connection string: {}", e)))?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(config.acquire_timeout());

        // Every connection to an in-memory database gets its own private store,
        // so those pools are pinned to a single long-lived connection.
        if is_in_memory(&config.url) {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            pool_options = pool_options.max_connections(config.max_connections);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::Connection(format!("Failed to connect to database: {}", e)))?;

        info!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.acquire_timeout_secs,
            "Database pool established"
        );
        Ok(Self { pool })
    }

    /// Private in-memory store with collections created, for tests and tooling
    pub async fn in_memory() -> AppResult<Self> {
        let config = DatabaseConfig::new("sqlite::memory:")?;
        let db = Self::connect(&config).await?;
        db.initialize().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create collection tables and indexes. Safe to run repeatedly.
    pub async fn initialize(&self) -> AppResult<()> {
        let statements = collection_ddl::<EventSchema>()
            .into_iter()
            .chain(collection_ddl::<BookingSchema>());

        for statement in statements {
            debug!(%statement, "Applying schema statement");
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to apply schema ({}): {}", statement, e))
                })?;
        }
        Ok(())
    }

    /// Health check to verify database connectivity
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    /// Get connection pool statistics (idle, total)
    pub fn pool_stats(&self) -> (u32, u32) {
        (self.pool.num_idle() as u32, self.pool.size())
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// True when the storage layer rejected a write on a unique index
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.initialize().await.unwrap();
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_unique_index_on_slug() {
        let db = Database::in_memory().await.unwrap();
        let insert = "INSERT INTO events (id, slug, document, created_at, updated_at) VALUES (?, 'same', '{}', 0, 0)";
        sqlx::query(insert).bind("a").execute(db.pool()).await.unwrap();
        let err = sqlx::query(insert).bind("b").execute(db.pool()).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_bad_connection_string() {
        let config = DatabaseConfig::new("sqlite:///missing-dir/nested/events.db").unwrap();
        let err = Database::connect(&config).await.unwrap_err();
        assert!(matches!(err, AppError::Connection(_)));
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:test?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://data/events.db"));
    }
}
