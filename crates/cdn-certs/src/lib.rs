//! Certificate auto-renewal for CDN delivery services

pub mod handlers;
pub mod renewal;

pub use renewal::{
    AcmeRenewalProvider, AuthType, AutorenewService, AutorenewServiceBuilder, CandidateScanner,
    CertificateKey, CertificateMaterial, DbCandidateScanner, DbKeyStore, EmailSummaryNotifier,
    ExpirationSummary, KeyStore, OutcomeBucket, ProviderError, ProviderRegistry, RenewalError,
    RenewalOrchestrator, RenewalOutcome, RenewalProvider, RenewalRequest, SummaryNotifier,
};

pub use handlers::{
    configure_routes, create_autorenew_app_state, AutorenewApiDoc, AutorenewAppState, CurrentUser,
};
