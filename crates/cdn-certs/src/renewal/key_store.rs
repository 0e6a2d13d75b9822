use async_trait::async_trait;
use cdn_database::DbConnection;
use cdn_entities::deliveryservice_ssl_keys;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;

use super::errors::KeyStoreError;
use super::models::CertificateMaterial;

/// Versioned storage for delivery service key bundles.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn get_material(
        &self,
        xml_id: &str,
        version: i64,
    ) -> Result<CertificateMaterial, KeyStoreError>;

    /// Stores `material` under its own `(xml_id, version)`, replacing any existing document.
    async fn put_material(&self, material: &CertificateMaterial) -> Result<(), KeyStoreError>;
}

/// Key store backed by the `deliveryservice_ssl_keys` table, one JSON document per version.
pub struct DbKeyStore {
    db: Arc<DbConnection>,
}

impl DbKeyStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyStore for DbKeyStore {
    async fn get_material(
        &self,
        xml_id: &str,
        version: i64,
    ) -> Result<CertificateMaterial, KeyStoreError> {
        let row = deliveryservice_ssl_keys::Entity::find()
            .filter(deliveryservice_ssl_keys::Column::XmlId.eq(xml_id))
            .filter(deliveryservice_ssl_keys::Column::Version.eq(version))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| KeyStoreError::NotFound {
                xml_id: xml_id.to_string(),
                version,
            })?;

        let material: CertificateMaterial = serde_json::from_str(&row.document)?;
        Ok(material)
    }

    async fn put_material(&self, material: &CertificateMaterial) -> Result<(), KeyStoreError> {
        let document = serde_json::to_string(material)?;

        let txn = self.db.begin().await?;
        deliveryservice_ssl_keys::Entity::insert(deliveryservice_ssl_keys::ActiveModel {
            xml_id: Set(material.xml_id.clone()),
            version: Set(material.version),
            document: Set(document),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([
                deliveryservice_ssl_keys::Column::XmlId,
                deliveryservice_ssl_keys::Column::Version,
            ])
            .update_column(deliveryservice_ssl_keys::Column::Document)
            .to_owned(),
        )
        .exec(&txn)
        .await?;
        txn.commit().await?;

        debug!("Stored key material for {}", material.key());
        Ok(())
    }
}
