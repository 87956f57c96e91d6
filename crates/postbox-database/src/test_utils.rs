//! Test utilities for database integration tests
//!
//! Every [`TestDatabase`] is a private in-memory SQLite database, so tests
//! never share state and need no external services.

use crate::DbConnection;
use postbox_migrations::Migrator;
use sea_orm::*;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

const MEMORY_URL: &str = "sqlite::memory:";

/// Test database backed by in-memory SQLite
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
    pub database_url: String,
}

impl TestDatabase {
    /// Create an empty database without schema
    pub async fn new() -> anyhow::Result<Self> {
        // The in-memory database lives as long as its only connection
        let mut opt = ConnectOptions::new(MEMORY_URL.to_owned());
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(opt)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open in-memory database: {}", e))?;

        let test_db = TestDatabase {
            db: Arc::new(db),
            database_url: MEMORY_URL.to_string(),
        };

        test_db
            .test_connection()
            .await
            .map_err(|e| anyhow::anyhow!("Initial connection test failed: {}", e))?;

        Ok(test_db)
    }

    /// Create a test database and run migrations
    pub async fn with_migrations() -> anyhow::Result<Self> {
        Self::with_custom_migrations::<Migrator>().await
    }

    /// Create a test database and run migrations with custom Migrator
    pub async fn with_custom_migrations<M>() -> anyhow::Result<Self>
    where
        M: MigratorTrait,
    {
        let test_db = Self::new().await?;

        M::up(&*test_db.db, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(test_db)
    }

    /// Execute raw SQL query for testing
    pub async fn execute_sql(&self, sql: &str) -> anyhow::Result<ExecResult> {
        let statement = Statement::from_string(DatabaseBackend::Sqlite, sql.to_owned());
        let result = self.db.execute(statement).await.map_err(anyhow::Error::from)?;
        Ok(result)
    }

    /// Query raw SQL and return results
    pub async fn query_sql(&self, sql: &str) -> anyhow::Result<Vec<QueryResult>> {
        let statement = Statement::from_string(DatabaseBackend::Sqlite, sql.to_owned());
        let result = self
            .db
            .query_all(statement)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(result)
    }

    /// Test the database connection
    pub async fn test_connection(&self) -> anyhow::Result<()> {
        self.execute_sql("SELECT 1").await?;
        Ok(())
    }

    /// Count rows in a table
    pub async fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        let rows = self
            .query_sql(&format!("SELECT COUNT(*) AS count FROM {}", table))
            .await?;
        let count = rows
            .first()
            .map(|row| row.try_get::<i64>("", "count"))
            .transpose()?
            .unwrap_or(0);
        Ok(count)
    }

    /// Get the database connection
    pub fn connection(&self) -> Arc<DbConnection> {
        Arc::clone(&self.db)
    }
}
