use axum::http::StatusCode;
use cdn_core::{AppSettings, AuditLogger, MalformedCertificatePolicy};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::audit::AutorenewalAudit;
use super::errors::RenewalError;
use super::expiration::{decode_certificate, needs_renewal, parse_expiration};
use super::key_store::KeyStore;
use super::models::{CertificateKey, OutcomeBucket, RenewalOutcome};
use super::notifier::SummaryNotifier;
use super::providers::{ProviderRegistry, RenewalProvider, RenewalRequest};
use super::strategy::{dispatch, RenewalStrategy};
use super::summary::{ExpirationSummary, SummaryBuilder};

/// Per-batch identity and stop conditions.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub batch_id: Uuid,
    pub requested_by: String,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl BatchContext {
    pub fn new(requested_by: impl Into<String>, deadline: Instant) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            requested_by: requested_by.into(),
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Why the batch must stop, if it must.
    pub fn stop_reason(&self) -> Option<&'static str> {
        if self.cancel.is_cancelled() {
            Some("batch cancelled")
        } else if Instant::now() >= self.deadline {
            Some("deadline exceeded")
        } else {
            None
        }
    }
}

enum Invocation {
    Finished(Option<String>),
    Stopped(&'static str),
}

/// Walks the candidate list one certificate at a time.
pub struct RenewalOrchestrator {
    key_store: Arc<dyn KeyStore>,
    providers: ProviderRegistry,
    settings: AppSettings,
    notifier: Option<Arc<dyn SummaryNotifier>>,
    audit_logger: Option<Arc<dyn AuditLogger>>,
}

impl RenewalOrchestrator {
    pub fn new(
        key_store: Arc<dyn KeyStore>,
        providers: ProviderRegistry,
        settings: AppSettings,
    ) -> Self {
        Self {
            key_store,
            providers,
            settings,
            notifier: None,
            audit_logger: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SummaryNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_audit_logger(mut self, audit_logger: Arc<dyn AuditLogger>) -> Self {
        self.audit_logger = Some(audit_logger);
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Runs one batch over `candidates`, then sends the summary and writes the audit record.
    ///
    /// Only a malformed certificate under [`MalformedCertificatePolicy::AbortBatch`]
    /// fails the batch; in that case no summary is sent.
    pub async fn run_batch(
        &self,
        candidates: Vec<CertificateKey>,
        ctx: &BatchContext,
    ) -> Result<ExpirationSummary, RenewalError> {
        let total = candidates.len();
        info!(
            "Starting certificate renewal batch over {} candidate(s) for {}",
            total, ctx.requested_by
        );

        match self.process(candidates, ctx).await {
            Ok(summary) => {
                info!(
                    "Renewal batch finished: {} outcome(s), {} failure(s){}",
                    summary.outcomes().len(),
                    summary.failures(),
                    if summary.truncated { ", truncated" } else { "" }
                );
                self.notify(&summary).await;
                self.audit(AutorenewalAudit::completed(&ctx.requested_by, total, &summary))
                    .await;
                Ok(summary)
            }
            Err(e) => {
                error!("Renewal batch aborted: {}", e);
                self.record_abort(ctx, total, &e).await;
                Err(e)
            }
        }
    }

    /// Writes the audit record for a batch that ended without a summary.
    pub async fn record_abort(&self, ctx: &BatchContext, candidates: usize, error: &RenewalError) {
        self.audit(AutorenewalAudit::aborted(
            ctx.batch_id,
            &ctx.requested_by,
            candidates,
            error.to_string(),
        ))
        .await;
    }

    async fn process(
        &self,
        candidates: Vec<CertificateKey>,
        ctx: &BatchContext,
    ) -> Result<ExpirationSummary, RenewalError> {
        let mut summary = SummaryBuilder::new(ctx.batch_id);
        let window = Duration::days(i64::from(self.settings.acme_renewal.window_days()));

        for key in candidates {
            if key.version <= 0 {
                continue;
            }
            if let Some(reason) = ctx.stop_reason() {
                warn!("Stopping renewal batch before {}: {}", key, reason);
                summary.mark_truncated();
                break;
            }

            let material = match self
                .key_store
                .get_material(&key.xml_id, key.version)
                .await
            {
                Ok(material) => material,
                Err(e) => {
                    warn!("Getting key material for {}: {}", key, e);
                    summary.record(
                        RenewalOutcome::new(&key, OutcomeBucket::Other).with_error(format!(
                            "getting key material for {} version {}: {}",
                            key.xml_id, key.version, e
                        )),
                    );
                    continue;
                }
            };

            let expiration = match decode_certificate(&material.certificate.crt)
                .and_then(|decoded| parse_expiration(&decoded))
            {
                Ok(expiration) => expiration,
                Err(source) => match self.settings.acme_renewal.malformed_certificate_policy {
                    MalformedCertificatePolicy::AbortBatch => {
                        return Err(RenewalError::MalformedCertificate {
                            xml_id: key.xml_id,
                            version: key.version,
                            source,
                        });
                    }
                    MalformedCertificatePolicy::Isolate => {
                        warn!("Skipping {}: {}", key, source);
                        summary.record(
                            RenewalOutcome::new(&key, OutcomeBucket::Other)
                                .with_auth_type(material.auth_type.clone())
                                .with_error(source.to_string()),
                        );
                        continue;
                    }
                },
            };

            if !needs_renewal(expiration, Utc::now(), window) {
                continue;
            }

            let new_version = key.version + 1;
            let strategy = dispatch(&material.auth_type(), &self.settings);
            debug!(
                "Renewing {} with auth type '{}' via {:?}",
                key, material.auth_type, strategy
            );

            let outcome = RenewalOutcome::new(&key, strategy.bucket())
                .with_expiration(expiration)
                .with_auth_type(material.auth_type.clone());

            let provider = match &strategy {
                RenewalStrategy::LetsEncrypt { .. } => Some(self.providers.lets_encrypt()),
                RenewalStrategy::NamedAcme { account } => match self.providers.named(account) {
                    Some(provider) => Some(provider),
                    None => {
                        summary.record(outcome.with_error(format!(
                            "no renewal provider registered for ACME account '{}'",
                            account
                        )));
                        continue;
                    }
                },
                RenewalStrategy::SelfSignedInformational => None,
                RenewalStrategy::Unresolved => {
                    summary.record(outcome.with_error(format!(
                        "no ACME account configured for '{}'",
                        material.auth_type
                    )));
                    continue;
                }
            };

            let Some(provider) = provider else {
                summary.record(outcome);
                continue;
            };

            let request = RenewalRequest {
                material,
                new_version,
                requested_by: ctx.requested_by.clone(),
                deadline: ctx.deadline,
            };
            let outcome = outcome.with_new_version(new_version);

            match self.invoke(provider.as_ref(), &request, ctx).await {
                Invocation::Finished(None) => summary.record(outcome),
                Invocation::Finished(Some(error)) => {
                    warn!("Renewal of {} failed: {}", key, error);
                    summary.record(outcome.with_error(error));
                }
                Invocation::Stopped(reason) => {
                    warn!("Abandoning renewal of {}: {}", key, reason);
                    summary.record(outcome.with_error(reason));
                    summary.mark_truncated();
                    break;
                }
            }
        }

        Ok(summary.finish())
    }

    async fn invoke(
        &self,
        provider: &dyn RenewalProvider,
        request: &RenewalRequest,
        ctx: &BatchContext,
    ) -> Invocation {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Invocation::Stopped("batch cancelled"),
            result = tokio::time::timeout_at(ctx.deadline, provider.renew(request)) => match result {
                Err(_) => Invocation::Stopped("deadline exceeded"),
                Ok(Ok(StatusCode::OK)) => Invocation::Finished(None),
                Ok(Ok(status)) => Invocation::Finished(Some(format!(
                    "Status code not 200: {}",
                    status.as_u16()
                ))),
                Ok(Err(e)) => Invocation::Finished(Some(e.to_string())),
            },
        }
    }

    async fn notify(&self, summary: &ExpirationSummary) {
        let Some(destination) = self.settings.summary_destination() else {
            debug!("Summary notification disabled");
            return;
        };
        let Some(notifier) = &self.notifier else {
            warn!("Summary notification configured but no notifier is available");
            return;
        };

        if let Err(e) = notifier.send(summary, destination).await {
            error!("Failed to send certificate expiration summary: {}", e);
        }
    }

    async fn audit(&self, record: AutorenewalAudit) {
        if let Some(audit_logger) = &self.audit_logger {
            if let Err(e) = audit_logger.create_audit_log(&record).await {
                error!("Failed to write renewal audit log: {}", e);
            }
        }
    }
}
