use anyhow::Context;
use cdn_core::AuditOperation;
use serde::Serialize;
use uuid::Uuid;

use super::models::OutcomeBucket;
use super::summary::ExpirationSummary;

pub const AUTORENEWAL_OPERATION: &str = "CERTIFICATE_AUTORENEWAL";

/// Audit record written once per batch, whether it completed or not.
#[derive(Debug, Clone, Serialize)]
pub struct AutorenewalAudit {
    pub batch_id: Uuid,
    pub requested_by: String,
    pub candidates: usize,
    pub lets_encrypt: usize,
    pub self_signed: usize,
    pub acme: usize,
    pub other: usize,
    pub failures: usize,
    pub truncated: bool,
    pub error: Option<String>,
}

impl AutorenewalAudit {
    pub fn completed(requested_by: &str, candidates: usize, summary: &ExpirationSummary) -> Self {
        Self {
            batch_id: summary.batch_id,
            requested_by: requested_by.to_string(),
            candidates,
            lets_encrypt: summary.count(OutcomeBucket::LetsEncrypt),
            self_signed: summary.count(OutcomeBucket::SelfSigned),
            acme: summary.count(OutcomeBucket::Acme),
            other: summary.count(OutcomeBucket::Other),
            failures: summary.failures(),
            truncated: summary.truncated,
            error: None,
        }
    }

    pub fn aborted(batch_id: Uuid, requested_by: &str, candidates: usize, error: String) -> Self {
        Self {
            batch_id,
            requested_by: requested_by.to_string(),
            candidates,
            lets_encrypt: 0,
            self_signed: 0,
            acme: 0,
            other: 0,
            failures: 0,
            truncated: false,
            error: Some(error),
        }
    }
}

impl AuditOperation for AutorenewalAudit {
    fn operation_type(&self) -> String {
        AUTORENEWAL_OPERATION.to_string()
    }

    fn user(&self) -> &str {
        &self.requested_by
    }

    fn serialize(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("Failed to serialize AutorenewalAudit")
    }
}
