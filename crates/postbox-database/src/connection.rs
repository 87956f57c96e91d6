//! Database connection management

use postbox_core::{DatabaseConfig, ServiceError, ServiceResult};
use postbox_migrations::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use tracing::{debug, info};

pub type DbConnection = DatabaseConnection;

/// Opens the pool and brings the schema up to date before returning it
pub async fn establish_connection(config: &DatabaseConfig) -> ServiceResult<Arc<DbConnection>> {
    config.validate()?;

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);

    let db = Database::connect(opt)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;
    debug!(
        "Connected to database (max_connections={}, min_connections={})",
        config.max_connections, config.min_connections
    );

    // Run migrations
    Migrator::up(&db, None)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;
    info!("Database schema is up to date");

    Ok(Arc::new(db))
}
