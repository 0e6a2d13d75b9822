//! Test utilities for database integration tests
//!
//! Every `TestDatabase` is a fresh, fully migrated in-memory SQLite database,
//! so tests never share state.

use crate::DbConnection;
use cdn_entities::{deliveryservice_ssl_keys, deliveryservices};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use sea_orm_migration::MigratorTrait;
use cdn_migrations::Migrator;
use std::sync::Arc;

pub struct TestDatabase {
    pub db: Arc<DbConnection>,
    pub database_url: String,
}

impl TestDatabase {
    pub async fn new() -> anyhow::Result<Self> {
        let database_url = "sqlite::memory:".to_string();
        let mut opt = ConnectOptions::new(database_url.clone());
        opt.max_connections(1).min_connections(1).sqlx_logging(false);

        let db = Database::connect(opt).await?;
        Migrator::up(&db, None).await?;

        Ok(Self {
            db: Arc::new(db),
            database_url,
        })
    }

    pub fn connection(&self) -> &DbConnection {
        &self.db
    }

    pub fn connection_arc(&self) -> Arc<DbConnection> {
        self.db.clone()
    }

    /// Inserts a delivery service row and returns it.
    pub async fn insert_delivery_service(
        &self,
        xml_id: &str,
        ssl_key_version: Option<i64>,
    ) -> anyhow::Result<deliveryservices::Model> {
        let model = deliveryservices::ActiveModel {
            xml_id: Set(xml_id.to_string()),
            cdn_name: Set("cdn1".to_string()),
            ssl_key_version: Set(ssl_key_version),
            ..Default::default()
        }
        .insert(self.connection())
        .await?;
        Ok(model)
    }

    /// Stores a raw key bundle document for `(xml_id, version)`.
    pub async fn insert_key_document(
        &self,
        xml_id: &str,
        version: i64,
        document: &str,
    ) -> anyhow::Result<deliveryservice_ssl_keys::Model> {
        let model = deliveryservice_ssl_keys::ActiveModel {
            xml_id: Set(xml_id.to_string()),
            version: Set(version),
            document: Set(document.to_string()),
            ..Default::default()
        }
        .insert(self.connection())
        .await?;
        Ok(model)
    }
}
