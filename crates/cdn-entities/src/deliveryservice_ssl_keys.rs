use async_trait::async_trait;
use cdn_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

/// Versioned key bundle for a delivery service, stored as a JSON document.
/// `(xml_id, version)` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveryservice_ssl_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub xml_id: String,
    pub version: i64,
    #[sea_orm(column_type = "Text")]
    pub document: String,
    pub created_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(chrono::Utc::now());
        }
        Ok(self)
    }
}
