use cdn_core::UtcDateTime;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::models::{OutcomeBucket, RenewalOutcome};

/// Collects outcomes while a batch runs. Append-only; consumed by [`SummaryBuilder::finish`].
#[derive(Debug)]
pub struct SummaryBuilder {
    batch_id: Uuid,
    started_at: UtcDateTime,
    outcomes: Vec<RenewalOutcome>,
    truncated: bool,
}

impl SummaryBuilder {
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            started_at: Utc::now(),
            outcomes: Vec::new(),
            truncated: false,
        }
    }

    pub fn record(&mut self, outcome: RenewalOutcome) {
        self.outcomes.push(outcome);
    }

    /// Marks that the batch stopped before every candidate was inspected.
    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub fn finish(self) -> ExpirationSummary {
        ExpirationSummary {
            batch_id: self.batch_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            truncated: self.truncated,
            outcomes: self.outcomes,
        }
    }
}

/// The finished result of one batch.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExpirationSummary {
    #[schema(value_type = String)]
    pub batch_id: Uuid,
    #[schema(value_type = String, format = DateTime)]
    pub started_at: UtcDateTime,
    #[schema(value_type = String, format = DateTime)]
    pub finished_at: UtcDateTime,
    pub truncated: bool,
    outcomes: Vec<RenewalOutcome>,
}

impl ExpirationSummary {
    /// All outcomes in the order they were recorded.
    pub fn outcomes(&self) -> &[RenewalOutcome] {
        &self.outcomes
    }

    pub fn bucket(&self, bucket: OutcomeBucket) -> impl Iterator<Item = &RenewalOutcome> {
        self.outcomes.iter().filter(move |o| o.bucket == bucket)
    }

    pub fn count(&self, bucket: OutcomeBucket) -> usize {
        self.bucket(bucket).count()
    }

    pub fn lets_encrypt(&self) -> Vec<&RenewalOutcome> {
        self.bucket(OutcomeBucket::LetsEncrypt).collect()
    }

    pub fn self_signed(&self) -> Vec<&RenewalOutcome> {
        self.bucket(OutcomeBucket::SelfSigned).collect()
    }

    pub fn acme(&self) -> Vec<&RenewalOutcome> {
        self.bucket(OutcomeBucket::Acme).collect()
    }

    pub fn other(&self) -> Vec<&RenewalOutcome> {
        self.bucket(OutcomeBucket::Other).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }
}
