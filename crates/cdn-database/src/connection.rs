//! Database connection management

use cdn_core::{ServiceError, ServiceResult};
use cdn_migrations::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use tracing::info;

pub type DbConnection = DatabaseConnection;

pub async fn establish_connection(database_url: &str) -> ServiceResult<Arc<DbConnection>> {
    let mut opt = ConnectOptions::new(database_url);
    if database_url.starts_with("sqlite") {
        // SQLite allows a single writer; an in-memory database also lives in one connection
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(100).min_connections(5);
    }
    opt.sqlx_logging(false);

    let db = Database::connect(opt)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;

    Migrator::up(&db, None)
        .await
        .map_err(|e| ServiceError::Migration(e.to_string()))?;

    info!("Database connection established and migrations applied");

    Ok(Arc::new(db))
}
