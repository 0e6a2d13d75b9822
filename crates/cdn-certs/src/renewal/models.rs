use cdn_core::UtcDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Auth type tag stored on Let's Encrypt issued key bundles.
pub const LETS_ENCRYPT_AUTH_TYPE: &str = "Lets Encrypt";
/// Auth type tag stored on self-signed key bundles.
pub const SELF_SIGNED_AUTH_TYPE: &str = "Self Signed";

/// Identifies one delivery service's certificate at a given key version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateKey {
    pub xml_id: String,
    pub version: i64,
}

impl CertificateKey {
    pub fn new(xml_id: impl Into<String>, version: i64) -> Self {
        Self {
            xml_id: xml_id.into(),
            version,
        }
    }
}

impl fmt::Display for CertificateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.xml_id, self.version)
    }
}

/// How a certificate was issued, parsed from the free-form tag on the key bundle.
/// Any tag that is not one of the two built-in values names an ACME account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthType {
    LetsEncrypt,
    SelfSigned,
    Named(String),
}

impl AuthType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            LETS_ENCRYPT_AUTH_TYPE => AuthType::LetsEncrypt,
            SELF_SIGNED_AUTH_TYPE => AuthType::SelfSigned,
            other => AuthType::Named(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            AuthType::LetsEncrypt => LETS_ENCRYPT_AUTH_TYPE,
            AuthType::SelfSigned => SELF_SIGNED_AUTH_TYPE,
            AuthType::Named(name) => name,
        }
    }
}

/// Certificate, private key and CSR, each base64-encoded PEM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBundle {
    pub crt: String,
    pub key: String,
    #[serde(default)]
    pub csr: String,
}

/// A complete versioned key bundle as held by the key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateMaterial {
    pub xml_id: String,
    pub version: i64,
    pub hostname: String,
    pub cdn: String,
    pub auth_type: String,
    pub certificate: CertificateBundle,
}

impl CertificateMaterial {
    pub fn key(&self) -> CertificateKey {
        CertificateKey::new(self.xml_id.clone(), self.version)
    }

    pub fn auth_type(&self) -> AuthType {
        AuthType::from_tag(&self.auth_type)
    }
}

/// The four partitions of a batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeBucket {
    LetsEncrypt,
    SelfSigned,
    Acme,
    Other,
}

impl OutcomeBucket {
    pub const ALL: [OutcomeBucket; 4] = [
        OutcomeBucket::LetsEncrypt,
        OutcomeBucket::SelfSigned,
        OutcomeBucket::Acme,
        OutcomeBucket::Other,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            OutcomeBucket::LetsEncrypt => "Let's Encrypt",
            OutcomeBucket::SelfSigned => "Self Signed",
            OutcomeBucket::Acme => "ACME Accounts",
            OutcomeBucket::Other => "Other",
        }
    }
}

/// Result of inspecting one candidate.
///
/// `version` is always the pre-renewal version. `new_version` is set only when a
/// provider was asked to issue a replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RenewalOutcome {
    pub xml_id: String,
    pub version: i64,
    pub new_version: Option<i64>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub expiration: Option<UtcDateTime>,
    pub auth_type: String,
    pub bucket: OutcomeBucket,
    pub error: Option<String>,
}

impl RenewalOutcome {
    pub fn new(key: &CertificateKey, bucket: OutcomeBucket) -> Self {
        Self {
            xml_id: key.xml_id.clone(),
            version: key.version,
            new_version: None,
            expiration: None,
            auth_type: String::new(),
            bucket,
            error: None,
        }
    }

    pub fn with_expiration(mut self, expiration: UtcDateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_auth_type(mut self, auth_type: impl Into<String>) -> Self {
        self.auth_type = auth_type.into();
        self
    }

    pub fn with_new_version(mut self, new_version: i64) -> Self {
        self.new_version = Some(new_version);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
