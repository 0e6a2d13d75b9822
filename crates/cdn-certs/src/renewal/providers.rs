use async_trait::async_trait;
use axum::http::StatusCode;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use cdn_core::{AcmeAccountSettings, AppSettings, LetsEncryptSettings};
use cdn_database::DbConnection;
use cdn_entities::{acme_accounts, dns_challenges};
use instant_acme::{
    Account, AccountCredentials, AuthorizationStatus, ChallengeType, ExternalAccountKey,
    Identifier, NewAccount, NewOrder, Order, OrderStatus,
};
use rcgen::{CertificateParams, DistinguishedName, KeyPair};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::errors::ProviderError;
use super::key_store::KeyStore;
use super::models::{CertificateBundle, CertificateMaterial, LETS_ENCRYPT_AUTH_TYPE};
use super::scanner::record_key_version;

/// Everything a provider needs to issue a replacement for one certificate.
#[derive(Debug, Clone)]
pub struct RenewalRequest {
    pub material: CertificateMaterial,
    pub new_version: i64,
    pub requested_by: String,
    pub deadline: Instant,
}

#[async_trait]
pub trait RenewalProvider: Send + Sync {
    /// Issues a new certificate for `request.material` and persists it at
    /// `request.new_version`. Returns the HTTP-style status of the operation.
    async fn renew(&self, request: &RenewalRequest) -> Result<StatusCode, ProviderError>;

    fn name(&self) -> &str;
}

/// The Let's Encrypt provider plus one provider per named ACME account.
#[derive(Clone)]
pub struct ProviderRegistry {
    lets_encrypt: Arc<dyn RenewalProvider>,
    named: HashMap<String, Arc<dyn RenewalProvider>>,
}

impl ProviderRegistry {
    pub fn new(lets_encrypt: Arc<dyn RenewalProvider>) -> Self {
        Self {
            lets_encrypt,
            named: HashMap::new(),
        }
    }

    pub fn with_named(mut self, account: impl Into<String>, provider: Arc<dyn RenewalProvider>) -> Self {
        self.named.insert(account.into(), provider);
        self
    }

    /// Builds ACME providers for Let's Encrypt and every configured account.
    pub fn from_settings(
        settings: &AppSettings,
        db: Arc<DbConnection>,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        let lets_encrypt = Arc::new(AcmeRenewalProvider::lets_encrypt(
            &settings.lets_encrypt,
            db.clone(),
            key_store.clone(),
        ));
        settings
            .acme_accounts
            .iter()
            .fold(Self::new(lets_encrypt), |registry, account| {
                let provider =
                    AcmeRenewalProvider::named_account(account, db.clone(), key_store.clone());
                registry.with_named(account.acme_provider.clone(), Arc::new(provider))
            })
    }

    pub fn lets_encrypt(&self) -> Arc<dyn RenewalProvider> {
        self.lets_encrypt.clone()
    }

    pub fn named(&self, account: &str) -> Option<Arc<dyn RenewalProvider>> {
        self.named.get(account).cloned()
    }
}

/// ACME account used by an [`AcmeRenewalProvider`].
#[derive(Debug, Clone)]
pub struct AcmeAccountConfig {
    pub email: String,
    pub directory_url: String,
    pub kid: Option<String>,
    pub hmac_encoded: Option<String>,
}

/// Renews certificates through an ACME directory using DNS-01 challenges.
///
/// TXT values are written to `dns_challenges`, where the CDN's DNS tier picks
/// them up. Issued material is written to the key store at the requested
/// version and the delivery service is pointed at it.
pub struct AcmeRenewalProvider {
    name: String,
    /// Auth type tag written on the issued key bundle
    issued_auth_type: String,
    account: AcmeAccountConfig,
    db: Arc<DbConnection>,
    key_store: Arc<dyn KeyStore>,
}

const DEFAULT_ACME_EMAIL: &str = "certs@localhost";

impl AcmeRenewalProvider {
    pub fn new(
        name: impl Into<String>,
        issued_auth_type: impl Into<String>,
        account: AcmeAccountConfig,
        db: Arc<DbConnection>,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        Self {
            name: name.into(),
            issued_auth_type: issued_auth_type.into(),
            account,
            db,
            key_store,
        }
    }

    pub fn lets_encrypt(
        settings: &LetsEncryptSettings,
        db: Arc<DbConnection>,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        let email = settings
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ACME_EMAIL.to_string());
        Self::new(
            "lets_encrypt",
            LETS_ENCRYPT_AUTH_TYPE,
            AcmeAccountConfig {
                email,
                directory_url: settings.directory(),
                kid: None,
                hmac_encoded: None,
            },
            db,
            key_store,
        )
    }

    pub fn named_account(
        settings: &AcmeAccountSettings,
        db: Arc<DbConnection>,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        Self::new(
            settings.acme_provider.clone(),
            settings.acme_provider.clone(),
            AcmeAccountConfig {
                email: settings.user_email.clone(),
                directory_url: settings.acme_url.clone(),
                kid: settings.kid.clone(),
                hmac_encoded: settings.hmac_encoded.clone(),
            },
            db,
            key_store,
        )
    }

    fn external_account_key(&self) -> Result<Option<ExternalAccountKey>, ProviderError> {
        match (&self.account.kid, &self.account.hmac_encoded) {
            (Some(kid), Some(hmac)) => {
                let key = URL_SAFE_NO_PAD
                    .decode(hmac.trim_end_matches('=').as_bytes())
                    .map_err(|e| {
                        ProviderError::user(format!(
                            "ACME account '{}' has an invalid hmac_encoded value: {}",
                            self.name, e
                        ))
                    })?;
                Ok(Some(ExternalAccountKey::new(kid.clone(), &key)))
            }
            _ => Ok(None),
        }
    }

    async fn get_or_create_acme_account(&self) -> Result<Account, ProviderError> {
        let cached = acme_accounts::Entity::find()
            .filter(acme_accounts::Column::Email.eq(&self.account.email))
            .filter(acme_accounts::Column::DirectoryUrl.eq(&self.account.directory_url))
            .one(self.db.as_ref())
            .await?;

        if let Some(cached) = cached {
            let credentials: AccountCredentials = serde_json::from_str(&cached.credentials)
                .map_err(|e| {
                    ProviderError::system(format!("Failed to deserialize account: {}", e))
                })?;
            return Ok(Account::from_credentials(credentials).await?);
        }

        info!(
            "Creating ACME account for {} at {}",
            self.account.email, self.account.directory_url
        );
        let external_account = self.external_account_key()?;
        let contact = format!("mailto:{}", self.account.email);
        let (account, credentials) = Account::create(
            &NewAccount {
                contact: &[contact.as_str()],
                terms_of_service_agreed: true,
                only_return_existing: false,
            },
            &self.account.directory_url,
            external_account.as_ref(),
        )
        .await?;

        let credentials = serde_json::to_string(&credentials)
            .map_err(|e| ProviderError::system(format!("Failed to serialize account: {}", e)))?;

        let txn = self.db.begin().await?;
        acme_accounts::Entity::insert(acme_accounts::ActiveModel {
            email: Set(self.account.email.clone()),
            directory_url: Set(self.account.directory_url.clone()),
            credentials: Set(credentials),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        })
        .exec(&txn)
        .await?;
        txn.commit().await?;

        Ok(account)
    }

    /// Publishes the DNS-01 TXT values for every pending authorization and
    /// returns the challenge URLs to mark ready.
    async fn publish_dns_challenges(
        &self,
        xml_id: &str,
        hostname: &str,
        order: &mut Order,
    ) -> Result<Vec<String>, ProviderError> {
        let authorizations = order.authorizations().await?;
        let record_name = challenge_record_name(hostname);
        let mut records = Vec::new();
        let mut urls = Vec::new();

        for authz in &authorizations {
            if authz.status != AuthorizationStatus::Pending {
                continue;
            }
            let challenge = authz
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Dns01)
                .ok_or_else(|| ProviderError::user("No DNS-01 challenge offered"))?;

            records.push(order.key_authorization(challenge).dns_value());
            urls.push(challenge.url.clone());
        }

        store_challenge_records(self.db.as_ref(), xml_id, &record_name, &records).await?;
        info!(
            "Published {} TXT record(s) at {} for {}",
            records.len(),
            record_name,
            xml_id
        );

        Ok(urls)
    }

    async fn wait_for_order_ready(
        &self,
        order: &mut Order,
        deadline: Instant,
    ) -> Result<(), ProviderError> {
        const MAX_ATTEMPTS: u32 = 6;
        const BASE_DELAY_SECS: u64 = 1;
        const MAX_DELAY_SECS: u64 = 30;

        for attempt in 1..=MAX_ATTEMPTS {
            // 1s, 2s, 4s, 8s, 16s, 30s
            let delay_secs =
                std::cmp::min(BASE_DELAY_SECS * 2u64.pow(attempt - 1), MAX_DELAY_SECS);
            let wake = Instant::now() + std::time::Duration::from_secs(delay_secs);
            if wake > deadline {
                return Err(ProviderError::system("deadline exceeded waiting for order"));
            }
            tokio::time::sleep_until(wake).await;

            let state = order.refresh().await?;
            match state.status {
                OrderStatus::Ready | OrderStatus::Valid => {
                    debug!("Order ready after {} attempt(s)", attempt);
                    return Ok(());
                }
                OrderStatus::Invalid => {
                    let message = format!("Order validation failed after {} attempt(s)", attempt);
                    error!("{}", message);
                    return Err(ProviderError::user(message));
                }
                _ => debug!(
                    "Order not ready yet (attempt {}/{})",
                    attempt, MAX_ATTEMPTS
                ),
            }
        }

        Err(ProviderError::system(format!(
            "Order validation timed out after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    async fn issue(
        &self,
        request: &RenewalRequest,
    ) -> Result<CertificateBundle, ProviderError> {
        let hostname = request.material.hostname.as_str();
        let names = if let Some(base) = hostname.strip_prefix("*.") {
            vec![hostname.to_string(), base.to_string()]
        } else {
            vec![hostname.to_string()]
        };
        let identifiers: Vec<Identifier> =
            names.iter().cloned().map(Identifier::Dns).collect();

        let account = self.get_or_create_acme_account().await?;
        let mut order = account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await?;

        if order.state().status == OrderStatus::Invalid {
            return Err(ProviderError::user(format!(
                "ACME order for {} is invalid",
                hostname
            )));
        }

        if order.state().status == OrderStatus::Pending {
            let urls = self
                .publish_dns_challenges(&request.material.xml_id, hostname, &mut order)
                .await?;
            for url in &urls {
                order.set_challenge_ready(url).await?;
            }
            self.wait_for_order_ready(&mut order, request.deadline)
                .await?;
        }

        let mut params = CertificateParams::new(names)?;
        params.distinguished_name = DistinguishedName::new();
        let private_key = KeyPair::generate()?;
        let csr = params.serialize_request(&private_key)?;

        if order.state().status != OrderStatus::Valid {
            order.finalize(csr.der()).await?;
        }

        let chain_pem = loop {
            match order.certificate().await? {
                Some(chain) => break chain,
                None => {
                    let wake = Instant::now() + std::time::Duration::from_secs(1);
                    if wake > request.deadline {
                        return Err(ProviderError::system(
                            "deadline exceeded waiting for certificate",
                        ));
                    }
                    tokio::time::sleep_until(wake).await;
                }
            }
        };

        Ok(CertificateBundle {
            crt: STANDARD.encode(chain_pem.as_bytes()),
            key: STANDARD.encode(private_key.serialize_pem().as_bytes()),
            csr: STANDARD.encode(csr.pem()?.as_bytes()),
        })
    }

    /// Writes the new bundle at `new_version` and points the delivery service at it.
    pub async fn store_issued(
        &self,
        request: &RenewalRequest,
        certificate: CertificateBundle,
    ) -> Result<CertificateMaterial, ProviderError> {
        let material = CertificateMaterial {
            xml_id: request.material.xml_id.clone(),
            version: request.new_version,
            hostname: request.material.hostname.clone(),
            cdn: request.material.cdn.clone(),
            auth_type: self.issued_auth_type.clone(),
            certificate,
        };
        self.key_store.put_material(&material).await?;
        record_key_version(self.db.as_ref(), &material.xml_id, material.version).await?;
        Ok(material)
    }
}

#[async_trait]
impl RenewalProvider for AcmeRenewalProvider {
    async fn renew(&self, request: &RenewalRequest) -> Result<StatusCode, ProviderError> {
        info!(
            "Renewing {} ({}) via {} as version {}, requested by {}",
            request.material.xml_id,
            request.material.hostname,
            self.name,
            request.new_version,
            request.requested_by
        );

        let issued = self.issue(request).await;

        // Challenge records are useless once the order is settled either way
        if let Err(e) = clear_challenge_records(self.db.as_ref(), &request.material.xml_id).await
        {
            warn!(
                "Failed to remove DNS challenges for {}: {}",
                request.material.xml_id, e
            );
        }

        let certificate = issued?;
        self.store_issued(request, certificate).await?;

        Ok(StatusCode::OK)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `_acme-challenge.<domain>`, with any wildcard label removed.
pub fn challenge_record_name(hostname: &str) -> String {
    let domain = hostname.strip_prefix("*.").unwrap_or(hostname);
    format!("_acme-challenge.{}", domain)
}

async fn store_challenge_records(
    db: &DbConnection,
    xml_id: &str,
    fqdn: &str,
    records: &[String],
) -> Result<(), sea_orm::DbErr> {
    if records.is_empty() {
        return Ok(());
    }
    let txn = db.begin().await?;
    let now = chrono::Utc::now();
    dns_challenges::Entity::insert_many(records.iter().map(|record| {
        dns_challenges::ActiveModel {
            xml_id: Set(xml_id.to_string()),
            fqdn: Set(fqdn.to_string()),
            record: Set(record.clone()),
            created_at: Set(now),
            ..Default::default()
        }
    }))
    .exec(&txn)
    .await?;
    txn.commit().await
}

async fn clear_challenge_records(db: &DbConnection, xml_id: &str) -> Result<u64, sea_orm::DbErr> {
    let result = dns_challenges::Entity::delete_many()
        .filter(dns_challenges::Column::XmlId.eq(xml_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renewal::key_store::DbKeyStore;
    use crate::renewal::scanner::{CandidateScanner, DbCandidateScanner};
    use crate::renewal::test_utils::{material_expiring_in, RecordingProvider};
    use crate::renewal::models::CertificateKey;
    use cdn_database::test_utils::TestDatabase;
    use std::time::Duration;

    fn provider_for(test_db: &TestDatabase, directory_url: &str) -> AcmeRenewalProvider {
        let db = test_db.connection_arc();
        let key_store: Arc<dyn KeyStore> = Arc::new(DbKeyStore::new(db.clone()));
        AcmeRenewalProvider::lets_encrypt(
            &LetsEncryptSettings {
                email: Some("certs@cdn.example".to_string()),
                directory_url: Some(directory_url.to_string()),
                ..Default::default()
            },
            db,
            key_store,
        )
    }

    fn request_for(material: CertificateMaterial) -> RenewalRequest {
        let new_version = material.version + 1;
        RenewalRequest {
            material,
            new_version,
            requested_by: "admin".to_string(),
            deadline: Instant::now() + Duration::from_secs(30),
        }
    }

    #[test]
    fn test_challenge_record_name() {
        assert_eq!(
            challenge_record_name("*.ds-1.cdn.example"),
            "_acme-challenge.ds-1.cdn.example"
        );
        assert_eq!(
            challenge_record_name("edge.cdn.example"),
            "_acme-challenge.edge.cdn.example"
        );
    }

    #[tokio::test]
    async fn test_invalid_hmac_is_a_user_error() -> anyhow::Result<()> {
        let test_db = TestDatabase::new().await?;
        let db = test_db.connection_arc();
        let provider = AcmeRenewalProvider::named_account(
            &AcmeAccountSettings {
                acme_provider: "zerossl".to_string(),
                user_email: "certs@cdn.example".to_string(),
                acme_url: "https://acme.zerossl.example/directory".to_string(),
                kid: Some("kid-1".to_string()),
                hmac_encoded: Some("not*base64url".to_string()),
            },
            db.clone(),
            Arc::new(DbKeyStore::new(db)),
        );

        let err = match provider.external_account_key() {
            Err(err) => err,
            Ok(_) => panic!("invalid hmac_encoded was accepted"),
        };
        assert!(err.is_user_error());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_a_system_error() -> anyhow::Result<()> {
        let test_db = TestDatabase::new().await?;
        test_db.insert_delivery_service("ds-1", Some(1)).await?;
        let provider = provider_for(&test_db, "https://127.0.0.1:1/directory");

        let request = request_for(material_expiring_in("ds-1", 1, "Lets Encrypt", 5));
        let err = provider.renew(&request).await.unwrap_err();

        assert!(!err.is_user_error());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // Nothing was issued, so the delivery service still points at version 1
        let scanner = DbCandidateScanner::new(test_db.connection_arc());
        assert_eq!(
            scanner.scan_candidates().await?,
            vec![CertificateKey::new("ds-1", 1)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_store_issued_writes_new_version() -> anyhow::Result<()> {
        let test_db = TestDatabase::new().await?;
        test_db.insert_delivery_service("ds-1", Some(1)).await?;
        let provider = provider_for(&test_db, "https://127.0.0.1:1/directory");

        let original = material_expiring_in("ds-1", 1, "Self Signed", 5);
        let replacement = material_expiring_in("ds-1", 1, "Self Signed", 90).certificate;
        let stored = provider
            .store_issued(&request_for(original), replacement.clone())
            .await?;

        assert_eq!(stored.version, 2);
        assert_eq!(stored.auth_type, "Lets Encrypt");

        let key_store = DbKeyStore::new(test_db.connection_arc());
        let loaded = key_store.get_material("ds-1", 2).await?;
        assert_eq!(loaded.certificate, replacement);

        let scanner = DbCandidateScanner::new(test_db.connection_arc());
        assert_eq!(
            scanner.scan_candidates().await?,
            vec![CertificateKey::new("ds-1", 2)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_challenge_records_round_trip() -> anyhow::Result<()> {
        let test_db = TestDatabase::new().await?;
        let db = test_db.connection();

        store_challenge_records(
            db,
            "ds-1",
            "_acme-challenge.ds-1.cdn.example",
            &["txt-a".to_string(), "txt-b".to_string()],
        )
        .await?;
        store_challenge_records(db, "ds-2", "_acme-challenge.ds-2.cdn.example", &[]).await?;

        let rows = dns_challenges::Entity::find().all(db).await?;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.fqdn == "_acme-challenge.ds-1.cdn.example"));

        assert_eq!(clear_challenge_records(db, "ds-1").await?, 2);
        assert!(dns_challenges::Entity::find().all(db).await?.is_empty());
        Ok(())
    }

    #[test]
    fn test_registry_lookup() {
        let lets_encrypt = Arc::new(RecordingProvider::succeeding("lets_encrypt"));
        let sectigo = Arc::new(RecordingProvider::succeeding("sectigo-acme"));
        let registry = ProviderRegistry::new(lets_encrypt).with_named("sectigo-acme", sectigo);

        assert_eq!(registry.lets_encrypt().name(), "lets_encrypt");
        assert_eq!(registry.named("sectigo-acme").unwrap().name(), "sectigo-acme");
        assert!(registry.named("unknown-acme").is_none());
    }

    #[tokio::test]
    async fn test_registry_from_settings() -> anyhow::Result<()> {
        let test_db = TestDatabase::new().await?;
        let db = test_db.connection_arc();
        let settings = AppSettings {
            acme_accounts: vec![AcmeAccountSettings {
                acme_provider: "sectigo-acme".to_string(),
                user_email: "certs@cdn.example".to_string(),
                acme_url: "https://acme.sectigo.example/directory".to_string(),
                kid: None,
                hmac_encoded: None,
            }],
            ..Default::default()
        };

        let registry =
            ProviderRegistry::from_settings(&settings, db.clone(), Arc::new(DbKeyStore::new(db)));
        assert_eq!(registry.lets_encrypt().name(), "lets_encrypt");
        assert_eq!(registry.named("sectigo-acme").unwrap().name(), "sectigo-acme");
        Ok(())
    }
}
