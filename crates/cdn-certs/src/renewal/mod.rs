pub mod audit;
pub mod errors;
pub mod expiration;
pub mod key_store;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod providers;
pub mod scanner;
pub mod service;
pub mod strategy;
pub mod summary;

#[cfg(test)]
pub mod test_utils;

// Re-export main types
pub use errors::{
    BuilderError, CertificateParseError, KeyStoreError, ProviderError, RenewalError, ScanError,
};
pub use key_store::{DbKeyStore, KeyStore};
pub use models::{
    AuthType, CertificateBundle, CertificateKey, CertificateMaterial, OutcomeBucket,
    RenewalOutcome,
};
pub use notifier::{EmailSummaryNotifier, SummaryNotifier};
pub use orchestrator::{BatchContext, RenewalOrchestrator};
pub use providers::{AcmeRenewalProvider, ProviderRegistry, RenewalProvider, RenewalRequest};
pub use scanner::{CandidateScanner, DbCandidateScanner};
pub use service::{AutorenewService, AutorenewServiceBuilder, BatchHandle};
pub use strategy::{dispatch, RenewalStrategy};
pub use summary::{ExpirationSummary, SummaryBuilder};
