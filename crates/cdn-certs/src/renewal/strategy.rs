use cdn_core::AppSettings;

use super::models::{AuthType, OutcomeBucket};

/// The renewal path chosen for one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalStrategy {
    /// Renew through Let's Encrypt. `converted` is set when the certificate
    /// was self-signed and is being moved to Let's Encrypt.
    LetsEncrypt { converted: bool },
    /// Reported only; self-signed certificates are not renewed automatically.
    SelfSignedInformational,
    /// Renew through the named ACME account.
    NamedAcme { account: String },
    /// No configured account matches the tag.
    Unresolved,
}

impl RenewalStrategy {
    pub fn bucket(&self) -> OutcomeBucket {
        match self {
            RenewalStrategy::LetsEncrypt { .. } => OutcomeBucket::LetsEncrypt,
            RenewalStrategy::SelfSignedInformational => OutcomeBucket::SelfSigned,
            RenewalStrategy::NamedAcme { .. } => OutcomeBucket::Acme,
            RenewalStrategy::Unresolved => OutcomeBucket::Other,
        }
    }
}

/// Maps an auth type to a renewal path using the conversion flag and the
/// configured ACME accounts.
pub fn dispatch(auth_type: &AuthType, settings: &AppSettings) -> RenewalStrategy {
    match auth_type {
        AuthType::LetsEncrypt => RenewalStrategy::LetsEncrypt { converted: false },
        AuthType::SelfSigned if settings.lets_encrypt.convert_self_signed => {
            RenewalStrategy::LetsEncrypt { converted: true }
        }
        AuthType::SelfSigned => RenewalStrategy::SelfSignedInformational,
        AuthType::Named(name) => match settings.acme_account(name) {
            Some(account) => RenewalStrategy::NamedAcme {
                account: account.acme_provider.clone(),
            },
            None => RenewalStrategy::Unresolved,
        },
    }
}
