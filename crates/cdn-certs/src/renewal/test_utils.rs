//! In-memory collaborators and certificate fixtures for unit tests.

use async_trait::async_trait;
use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cdn_core::notifications::{EmailMessage, NotificationError, NotificationService};
use cdn_core::{AuditLogger, AuditOperation, UtcDateTime};
use chrono::{Duration, Utc};
use rcgen::{CertificateParams, KeyPair};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

use super::errors::{KeyStoreError, ProviderError, ScanError};
use super::key_store::KeyStore;
use super::models::{CertificateBundle, CertificateKey, CertificateMaterial};
use super::notifier::SummaryNotifier;
use super::providers::{RenewalProvider, RenewalRequest};
use super::scanner::CandidateScanner;
use super::summary::ExpirationSummary;

/// Self-signed certificate for `hostname` valid until `not_after`. Returns (cert PEM, key PEM).
pub fn generate_certificate(hostname: &str, not_after: UtcDateTime) -> (String, String) {
    let mut params = CertificateParams::new(vec![hostname.to_string()]).unwrap();
    params.not_before =
        time::OffsetDateTime::from_unix_timestamp((not_after - Duration::days(90)).timestamp())
            .unwrap();
    params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
    let key_pair = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    (cert.pem(), key_pair.serialize_pem())
}

pub fn encoded_certificate_expiring_at(hostname: &str, not_after: UtcDateTime) -> String {
    let (pem, _) = generate_certificate(hostname, not_after);
    STANDARD.encode(pem.as_bytes())
}

/// Key bundle whose certificate expires `days` from now.
pub fn material_expiring_in(
    xml_id: &str,
    version: i64,
    auth_type: &str,
    days: i64,
) -> CertificateMaterial {
    let hostname = format!("*.{}.cdn.example", xml_id);
    let (pem, key) = generate_certificate(&hostname, Utc::now() + Duration::days(days));
    CertificateMaterial {
        xml_id: xml_id.to_string(),
        version,
        hostname,
        cdn: "cdn1".to_string(),
        auth_type: auth_type.to_string(),
        certificate: CertificateBundle {
            crt: STANDARD.encode(pem.as_bytes()),
            key: STANDARD.encode(key.as_bytes()),
            csr: String::new(),
        },
    }
}

#[derive(Default)]
pub struct InMemoryKeyStore {
    materials: RwLock<HashMap<(String, i64), CertificateMaterial>>,
    get_calls: AtomicUsize,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_materials(materials: impl IntoIterator<Item = CertificateMaterial>) -> Self {
        let map = materials
            .into_iter()
            .map(|m| ((m.xml_id.clone(), m.version), m))
            .collect();
        Self {
            materials: RwLock::new(map),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn get_material(
        &self,
        xml_id: &str,
        version: i64,
    ) -> Result<CertificateMaterial, KeyStoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.materials
            .read()
            .await
            .get(&(xml_id.to_string(), version))
            .cloned()
            .ok_or_else(|| KeyStoreError::NotFound {
                xml_id: xml_id.to_string(),
                version,
            })
    }

    async fn put_material(&self, material: &CertificateMaterial) -> Result<(), KeyStoreError> {
        self.materials.write().await.insert(
            (material.xml_id.clone(), material.version),
            material.clone(),
        );
        Ok(())
    }
}

pub struct MockScanner {
    result: Result<Vec<CertificateKey>, String>,
    calls: AtomicUsize,
}

impl MockScanner {
    pub fn returning(candidates: Vec<CertificateKey>) -> Self {
        Self {
            result: Ok(candidates),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateScanner for MockScanner {
    async fn scan_candidates(&self) -> Result<Vec<CertificateKey>, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(ScanError::Database)
    }
}

enum ProviderBehaviour {
    Status(StatusCode),
    Fail(ProviderError),
    /// Never completes; used to exercise deadlines and cancellation.
    Hang,
    Panic,
}

pub struct RecordingProvider {
    name: String,
    behaviour: ProviderBehaviour,
    requests: Mutex<Vec<RenewalRequest>>,
}

impl RecordingProvider {
    fn with_behaviour(name: &str, behaviour: ProviderBehaviour) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(name: &str) -> Self {
        Self::with_behaviour(name, ProviderBehaviour::Status(StatusCode::OK))
    }

    pub fn with_status(name: &str, status: StatusCode) -> Self {
        Self::with_behaviour(name, ProviderBehaviour::Status(status))
    }

    pub fn failing(name: &str, error: ProviderError) -> Self {
        Self::with_behaviour(name, ProviderBehaviour::Fail(error))
    }

    pub fn hanging(name: &str) -> Self {
        Self::with_behaviour(name, ProviderBehaviour::Hang)
    }

    pub fn panicking(name: &str) -> Self {
        Self::with_behaviour(name, ProviderBehaviour::Panic)
    }

    pub async fn requests(&self) -> Vec<RenewalRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl RenewalProvider for RecordingProvider {
    async fn renew(&self, request: &RenewalRequest) -> Result<StatusCode, ProviderError> {
        self.requests.lock().await.push(request.clone());
        match &self.behaviour {
            ProviderBehaviour::Status(status) => Ok(*status),
            ProviderBehaviour::Fail(error) => Err(error.clone()),
            ProviderBehaviour::Hang => {
                std::future::pending::<()>().await;
                Ok(StatusCode::OK)
            }
            ProviderBehaviour::Panic => panic!("{} provider blew up", self.name),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(ExpirationSummary, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<(ExpirationSummary, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl SummaryNotifier for RecordingNotifier {
    async fn send(
        &self,
        summary: &ExpirationSummary,
        destination: &str,
    ) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .await
            .push((summary.clone(), destination.to_string()));
        if self.fail {
            return Err(NotificationError::SendError("smtp relay refused".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotificationService {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl RecordingNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationService for RecordingNotificationService {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::SendError("smtp relay refused".to_string()));
        }
        self.sent.lock().await.push(message);
        Ok(())
    }

    async fn is_configured(&self) -> Result<bool, NotificationError> {
        Ok(!self.fail)
    }
}

/// (operation type, user, serialized data)
pub type AuditEntry = (String, String, serde_json::Value);

#[derive(Default)]
pub struct RecordingAuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
    fail: bool,
}

impl RecordingAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditLogger for RecordingAuditLogger {
    async fn create_audit_log(&self, operation: &dyn AuditOperation) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("audit table unavailable");
        }
        let data: serde_json::Value = serde_json::from_str(&operation.serialize()?)?;
        self.entries.lock().await.push((
            operation.operation_type(),
            operation.user().to_string(),
            data,
        ));
        Ok(())
    }
}
