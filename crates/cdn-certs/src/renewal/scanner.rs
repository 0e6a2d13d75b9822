use async_trait::async_trait;
use cdn_database::DbConnection;
use cdn_entities::deliveryservices;
use sea_orm::{
    sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;

use super::errors::ScanError;
use super::models::CertificateKey;

/// Produces the set of certificate keys a batch should inspect.
#[async_trait]
pub trait CandidateScanner: Send + Sync {
    async fn scan_candidates(&self) -> Result<Vec<CertificateKey>, ScanError>;
}

/// Reads candidates from `deliveryservices` inside one short read transaction.
pub struct DbCandidateScanner {
    db: Arc<DbConnection>,
}

impl DbCandidateScanner {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CandidateScanner for DbCandidateScanner {
    async fn scan_candidates(&self) -> Result<Vec<CertificateKey>, ScanError> {
        let txn = self.db.begin().await?;

        // `!= 0` also drops rows whose version is NULL
        let rows = deliveryservices::Entity::find()
            .filter(deliveryservices::Column::SslKeyVersion.ne(0))
            .order_by_asc(deliveryservices::Column::Id)
            .all(&txn)
            .await?;

        txn.commit().await?;

        let candidates: Vec<CertificateKey> = rows
            .into_iter()
            .filter_map(|row| {
                row.ssl_key_version
                    .map(|version| CertificateKey::new(row.xml_id, version))
            })
            .collect();

        debug!("Found {} renewal candidate(s)", candidates.len());
        Ok(candidates)
    }
}

/// Points a delivery service at a newly issued key version, in its own transaction.
pub async fn record_key_version(
    db: &DbConnection,
    xml_id: &str,
    version: i64,
) -> Result<(), sea_orm::DbErr> {
    let txn = db.begin().await?;
    let result = deliveryservices::Entity::update_many()
        .col_expr(deliveryservices::Column::SslKeyVersion, Expr::value(version))
        .col_expr(
            deliveryservices::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(deliveryservices::Column::XmlId.eq(xml_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    if result.rows_affected == 0 {
        return Err(sea_orm::DbErr::RecordNotFound(format!(
            "delivery service {}",
            xml_id
        )));
    }
    Ok(())
}
