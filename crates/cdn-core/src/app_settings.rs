use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Renewal window used when `renew_days_before_expiration` is left at 0.
pub const DEFAULT_RENEW_DAYS_BEFORE_EXPIRATION: u32 = 30;

/// Per-certificate budget used to size the batch deadline (20 minutes).
pub const DEFAULT_PER_CERTIFICATE_TIMEOUT_SECS: u64 = 20 * 60;

const LETS_ENCRYPT_PRODUCTION_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETS_ENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error reading settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Control plane settings, loaded from YAML.
/// All fields have defaults so an empty document is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct AppSettings {
    pub acme_renewal: AcmeRenewalSettings,
    pub lets_encrypt: LetsEncryptSettings,
    pub acme_accounts: Vec<AcmeAccountSettings>,
    pub smtp: SmtpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AcmeRenewalSettings {
    /// Certificates expiring within this many days are renewed. 0 means 30.
    pub renew_days_before_expiration: u32,
    /// Destination of the summary email. Empty disables the summary.
    pub summary_email: String,
    pub per_certificate_timeout_secs: u64,
    pub malformed_certificate_policy: MalformedCertificatePolicy,
}

/// What a batch does when stored certificate material cannot be decoded or parsed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MalformedCertificatePolicy {
    /// Stop the batch; no summary is sent.
    #[default]
    AbortBatch,
    /// Record the failure in the `other` bucket and move on.
    Isolate,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LetsEncryptSettings {
    pub email: Option<String>,
    /// `production` or `staging`
    pub environment: String,
    /// Overrides the directory derived from `environment` (e.g. a Pebble instance).
    pub directory_url: Option<String>,
    /// Renew self-signed certificates through Let's Encrypt instead of only reporting them.
    pub convert_self_signed: bool,
}

/// A named third-party ACME account. Delivery services whose auth type equals
/// `acme_provider` are renewed through this account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AcmeAccountSettings {
    pub acme_provider: String,
    pub user_email: String,
    pub acme_url: String,
    #[serde(default)]
    pub kid: Option<String>,
    /// Base64url-encoded HMAC key for External Account Binding
    #[serde(default)]
    pub hmac_encoded: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTlsMode {
    None,
    #[default]
    Starttls,
    Tls,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SmtpSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
    pub tls_mode: SmtpTlsMode,
}

impl Default for AcmeRenewalSettings {
    fn default() -> Self {
        Self {
            renew_days_before_expiration: DEFAULT_RENEW_DAYS_BEFORE_EXPIRATION,
            summary_email: String::new(),
            per_certificate_timeout_secs: DEFAULT_PER_CERTIFICATE_TIMEOUT_SECS,
            malformed_certificate_policy: MalformedCertificatePolicy::default(),
        }
    }
}

impl AcmeRenewalSettings {
    /// The renewal window in days, with 0 treated as the default of 30.
    pub fn window_days(&self) -> u32 {
        if self.renew_days_before_expiration == 0 {
            DEFAULT_RENEW_DAYS_BEFORE_EXPIRATION
        } else {
            self.renew_days_before_expiration
        }
    }

    /// The time budget per certificate, with 0 treated as the default of 20 minutes.
    pub fn per_certificate_timeout(&self) -> Duration {
        if self.per_certificate_timeout_secs == 0 {
            Duration::from_secs(DEFAULT_PER_CERTIFICATE_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.per_certificate_timeout_secs)
        }
    }
}

impl Default for LetsEncryptSettings {
    fn default() -> Self {
        Self {
            email: None,
            environment: "production".to_string(),
            directory_url: None,
            convert_self_signed: false,
        }
    }
}

impl LetsEncryptSettings {
    pub fn directory(&self) -> String {
        if let Some(url) = self.directory_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        if self.environment == "production" {
            LETS_ENCRYPT_PRODUCTION_URL.to_string()
        } else {
            LETS_ENCRYPT_STAGING_URL.to_string()
        }
    }
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: "no-reply@localhost".to_string(),
            from_name: None,
            tls_mode: SmtpTlsMode::default(),
        }
    }
}

impl AppSettings {
    pub fn from_yaml_str(contents: &str) -> Result<Self, SettingsError> {
        // An empty document deserializes to unit, not to a map
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: AppSettings = serde_yaml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Looks up a named ACME account by the auth type stored on the certificate.
    pub fn acme_account(&self, acme_provider: &str) -> Option<&AcmeAccountSettings> {
        self.acme_accounts
            .iter()
            .find(|account| account.acme_provider == acme_provider)
    }

    /// The summary is only sent when SMTP is enabled and a destination is configured.
    pub fn summary_destination(&self) -> Option<&str> {
        let destination = self.acme_renewal.summary_email.trim();
        if self.smtp.enabled && !destination.is_empty() {
            Some(destination)
        } else {
            None
        }
    }

    fn validate(&self) -> Result<(), SettingsError> {
        for account in &self.acme_accounts {
            if account.acme_provider.trim().is_empty() {
                return Err(SettingsError::Invalid(
                    "acme_accounts entries need a non-empty acme_provider".to_string(),
                ));
            }
            if account.kid.is_some() != account.hmac_encoded.is_some() {
                return Err(SettingsError::Invalid(format!(
                    "ACME account '{}' must set both kid and hmac_encoded or neither",
                    account.acme_provider
                )));
            }
        }
        Ok(())
    }
}
