//! Builds the renewal service from settings and a database connection.

use cdn_audit::AuditService;
use cdn_certs::{
    AutorenewService, AutorenewServiceBuilder, DbCandidateScanner, DbKeyStore,
    EmailSummaryNotifier, KeyStore, ProviderRegistry, RenewalOrchestrator,
};
use cdn_core::AppSettings;
use cdn_database::DbConnection;
use cdn_notifications::SmtpNotificationService;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub fn load_settings(config: Option<&Path>) -> anyhow::Result<AppSettings> {
    match config {
        Some(path) => {
            debug!("Loading settings from {}", path.display());
            AppSettings::from_yaml_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))
        }
        None => {
            warn!("No settings file given, using defaults");
            Ok(AppSettings::default())
        }
    }
}

pub fn build_autorenew_service(
    settings: AppSettings,
    db: Arc<DbConnection>,
) -> anyhow::Result<Arc<AutorenewService>> {
    let key_store: Arc<dyn KeyStore> = Arc::new(DbKeyStore::new(db.clone()));
    let providers = ProviderRegistry::from_settings(&settings, db.clone(), key_store.clone());

    let notification_service = Arc::new(
        SmtpNotificationService::new(settings.smtp.clone())
            .map_err(|e| anyhow::anyhow!("Failed to configure SMTP: {}", e))?,
    );
    let notifier = Arc::new(EmailSummaryNotifier::new(notification_service));
    let audit = Arc::new(AuditService::new(db.clone()));

    info!(
        "Renewal window {} day(s), {} named ACME account(s), summary {}",
        settings.acme_renewal.window_days(),
        settings.acme_accounts.len(),
        settings.summary_destination().unwrap_or("disabled")
    );

    let orchestrator = RenewalOrchestrator::new(key_store, providers, settings)
        .with_notifier(notifier)
        .with_audit_logger(audit);

    let service = AutorenewServiceBuilder::new()
        .with_scanner(Arc::new(DbCandidateScanner::new(db)))
        .with_orchestrator(Arc::new(orchestrator))
        .build()?;

    Ok(Arc::new(service))
}
