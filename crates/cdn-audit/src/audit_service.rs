use anyhow::Context;
use cdn_core::{AuditLogger, AuditOperation};
use cdn_database::DbConnection;
use cdn_entities::audit_logs;
use chrono::Utc;
use sea_orm::{prelude::*, Set, TransactionTrait};
use std::sync::Arc;
use tracing::debug;

pub struct AuditService {
    db: Arc<DbConnection>,
}

impl AuditService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }

    /// Writes one audit row in its own transaction, independent of any
    /// transaction the caller may have used for the audited work.
    pub async fn create_audit_log_typed<T: AuditOperation + ?Sized>(
        &self,
        operation: &T,
    ) -> anyhow::Result<audit_logs::Model> {
        let now = Utc::now();
        let data_json = operation.serialize()?;

        let txn = self
            .db
            .begin()
            .await
            .context("Failed to open audit transaction")?;

        let new_audit_log = audit_logs::ActiveModel {
            username: Set(operation.user().to_string()),
            operation_type: Set(operation.operation_type()),
            audit_date: Set(now),
            created_at: Set(now),
            data: Set(data_json),
            ..Default::default()
        };

        let result = new_audit_log
            .insert(&txn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create audit log: {}", e))?;

        txn.commit()
            .await
            .context("Failed to commit audit transaction")?;

        debug!(
            "Audit log {} recorded for {}",
            result.id, result.operation_type
        );
        Ok(result)
    }
}

#[async_trait::async_trait]
impl AuditLogger for AuditService {
    async fn create_audit_log(&self, operation: &dyn AuditOperation) -> anyhow::Result<()> {
        self.create_audit_log_typed(operation).await?;
        Ok(())
    }
}
