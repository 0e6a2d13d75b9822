//! End-to-end renewal batches over a migrated SQLite database.

use async_trait::async_trait;
use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cdn_certs::renewal::scanner::record_key_version;
use cdn_certs::renewal::CertificateBundle;
use cdn_certs::{
    AutorenewServiceBuilder, CertificateMaterial, DbCandidateScanner, DbKeyStore, KeyStore,
    ProviderError, ProviderRegistry, RenewalOrchestrator, RenewalProvider, RenewalRequest,
};
use cdn_core::{AcmeAccountSettings, AppSettings};
use cdn_database::test_utils::TestDatabase;
use cdn_database::DbConnection;
use cdn_entities::deliveryservices;
use chrono::{Duration, Utc};
use rcgen::{CertificateParams, KeyPair};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;

fn certificate_expiring_in(hostname: &str, days: i64) -> CertificateBundle {
    let not_after = Utc::now() + Duration::days(days);
    let mut params = CertificateParams::new(vec![hostname.to_string()]).unwrap();
    params.not_before =
        time::OffsetDateTime::from_unix_timestamp((not_after - Duration::days(90)).timestamp())
            .unwrap();
    params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
    let key_pair = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    CertificateBundle {
        crt: STANDARD.encode(cert.pem()),
        key: STANDARD.encode(key_pair.serialize_pem()),
        csr: String::new(),
    }
}

fn material(xml_id: &str, version: i64, auth_type: &str, days: i64) -> CertificateMaterial {
    let hostname = format!("*.{}.cdn.example", xml_id);
    CertificateMaterial {
        xml_id: xml_id.to_string(),
        version,
        certificate: certificate_expiring_in(&hostname, days),
        hostname,
        cdn: "cdn1".to_string(),
        auth_type: auth_type.to_string(),
    }
}

/// Issues a fresh 90 day certificate locally and persists it like a real provider.
struct LocalIssuer {
    name: String,
    issued_auth_type: String,
    db: Arc<DbConnection>,
    key_store: Arc<DbKeyStore>,
}

#[async_trait]
impl RenewalProvider for LocalIssuer {
    async fn renew(&self, request: &RenewalRequest) -> Result<StatusCode, ProviderError> {
        let mut issued = request.material.clone();
        issued.version = request.new_version;
        issued.auth_type = self.issued_auth_type.clone();
        issued.certificate = certificate_expiring_in(&issued.hostname, 90);

        self.key_store.put_material(&issued).await?;
        record_key_version(&self.db, &issued.xml_id, issued.version).await?;
        Ok(StatusCode::OK)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

async fn key_version(db: &DbConnection, xml_id: &str) -> Option<i64> {
    deliveryservices::Entity::find()
        .filter(deliveryservices::Column::XmlId.eq(xml_id))
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .ssl_key_version
}

#[tokio::test]
async fn test_batch_renews_and_persists_new_versions() {
    let test_db = TestDatabase::new().await.unwrap();
    let db = test_db.connection_arc();
    let key_store = Arc::new(DbKeyStore::new(db.clone()));

    for (xml_id, version) in [
        ("ds-le", Some(1)),
        ("ds-self", Some(2)),
        ("ds-far", Some(1)),
        ("ds-sectigo", Some(4)),
        ("ds-unknown", Some(1)),
        ("ds-missing", Some(3)),
        ("ds-zero", Some(0)),
        ("ds-null", None),
    ] {
        test_db.insert_delivery_service(xml_id, version).await.unwrap();
    }
    for m in [
        material("ds-le", 1, "Lets Encrypt", 5),
        material("ds-self", 2, "Self Signed", 10),
        material("ds-far", 1, "Lets Encrypt", 200),
        material("ds-sectigo", 4, "sectigo-acme", 2),
        material("ds-unknown", 1, "digicert-acme", 2),
    ] {
        key_store.put_material(&m).await.unwrap();
    }

    let mut settings = AppSettings::default();
    settings.acme_accounts.push(AcmeAccountSettings {
        acme_provider: "sectigo-acme".to_string(),
        user_email: "certs@cdn.example".to_string(),
        acme_url: "https://acme.sectigo.example/directory".to_string(),
        kid: None,
        hmac_encoded: None,
    });

    let providers = ProviderRegistry::new(Arc::new(LocalIssuer {
        name: "lets_encrypt".to_string(),
        issued_auth_type: "Lets Encrypt".to_string(),
        db: db.clone(),
        key_store: key_store.clone(),
    }))
    .with_named(
        "sectigo-acme",
        Arc::new(LocalIssuer {
            name: "sectigo-acme".to_string(),
            issued_auth_type: "sectigo-acme".to_string(),
            db: db.clone(),
            key_store: key_store.clone(),
        }),
    );

    let orchestrator = RenewalOrchestrator::new(key_store.clone(), providers, settings);
    let service = AutorenewServiceBuilder::new()
        .with_scanner(Arc::new(DbCandidateScanner::new(db.clone())))
        .with_orchestrator(Arc::new(orchestrator))
        .build()
        .unwrap();

    let summary = service.run_once("admin").await.unwrap();

    let lets_encrypt = summary.lets_encrypt();
    assert_eq!(lets_encrypt.len(), 1);
    assert_eq!(lets_encrypt[0].xml_id, "ds-le");
    assert_eq!(lets_encrypt[0].version, 1);
    assert!(lets_encrypt[0].error.is_none());

    let self_signed = summary.self_signed();
    assert_eq!(self_signed.len(), 1);
    assert_eq!(self_signed[0].xml_id, "ds-self");

    let acme = summary.acme();
    assert_eq!(acme.len(), 1);
    assert_eq!(acme[0].xml_id, "ds-sectigo");
    assert!(acme[0].error.is_none());

    let mut other: Vec<_> = summary.other().iter().map(|o| o.xml_id.clone()).collect();
    other.sort();
    assert_eq!(other, vec!["ds-missing", "ds-unknown"]);

    assert!(!summary.truncated);

    assert_eq!(key_version(&db, "ds-le").await, Some(2));
    assert_eq!(key_version(&db, "ds-sectigo").await, Some(5));
    assert_eq!(key_version(&db, "ds-self").await, Some(2));
    assert_eq!(key_version(&db, "ds-far").await, Some(1));
    assert_eq!(key_version(&db, "ds-unknown").await, Some(1));

    let renewed = key_store.get_material("ds-le", 2).await.unwrap();
    assert_eq!(renewed.auth_type, "Lets Encrypt");
    assert_eq!(renewed.hostname, "*.ds-le.cdn.example");
    // Previous version is kept
    assert!(key_store.get_material("ds-le", 1).await.is_ok());

    // Renewed certificates are now outside the window
    let second = service.run_once("admin").await.unwrap();
    assert!(second.lets_encrypt().is_empty());
    assert!(second.acme().is_empty());
    assert_eq!(second.self_signed().len(), 1);
    assert_eq!(key_version(&db, "ds-le").await, Some(2));
}

#[tokio::test]
async fn test_malformed_certificate_aborts_batch() {
    let test_db = TestDatabase::new().await.unwrap();
    let db = test_db.connection_arc();
    let key_store = Arc::new(DbKeyStore::new(db.clone()));

    test_db.insert_delivery_service("ds-bad", Some(1)).await.unwrap();
    let mut bad = material("ds-bad", 1, "Lets Encrypt", 5);
    bad.certificate.crt = "%%% not base64 %%%".to_string();
    key_store.put_material(&bad).await.unwrap();

    let providers = ProviderRegistry::new(Arc::new(LocalIssuer {
        name: "lets_encrypt".to_string(),
        issued_auth_type: "Lets Encrypt".to_string(),
        db: db.clone(),
        key_store: key_store.clone(),
    }));
    let orchestrator = RenewalOrchestrator::new(key_store, providers, AppSettings::default());
    let service = AutorenewServiceBuilder::new()
        .with_scanner(Arc::new(DbCandidateScanner::new(db.clone())))
        .with_orchestrator(Arc::new(orchestrator))
        .build()
        .unwrap();

    let result = service.run_once("admin").await;

    assert!(matches!(
        result,
        Err(cdn_certs::RenewalError::MalformedCertificate { .. })
    ));
    assert_eq!(key_version(&db, "ds-bad").await, Some(1));
}
