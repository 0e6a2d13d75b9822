use axum::http::StatusCode;
use cdn_core::error_builder::{conflict, internal_server_error, not_found};
use cdn_core::problemdetails::Problem;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<sea_orm::DbErr> for ScanError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::ConnectionAcquire(err) => ScanError::Connection(err.to_string()),
            sea_orm::DbErr::Conn(err) => ScanError::Connection(err.to_string()),
            _ => ScanError::Database(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("no key material for {xml_id} version {version}")]
    NotFound { xml_id: String, version: i64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid key document: {0}")]
    InvalidDocument(String),
}

impl From<sea_orm::DbErr> for KeyStoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        KeyStoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for KeyStoreError {
    fn from(err: serde_json::Error) -> Self {
        KeyStoreError::InvalidDocument(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateParseError {
    #[error("decoding certificate: {0}")]
    Decode(String),

    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),
}

/// Failure reported by a renewal provider. `User` errors need operator action
/// (bad configuration, rejected order); `System` errors are infrastructure failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{message}")]
    User { message: String, status: StatusCode },

    #[error("{message}")]
    System { message: String, status: StatusCode },
}

impl ProviderError {
    pub fn user(message: impl Into<String>) -> Self {
        ProviderError::User {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        ProviderError::System {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProviderError::User { status, .. } | ProviderError::System { status, .. } => *status,
        }
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self, ProviderError::User { .. })
    }
}

impl From<instant_acme::Error> for ProviderError {
    fn from(err: instant_acme::Error) -> Self {
        ProviderError::system(format!("ACME error: {}", err))
    }
}

impl From<rcgen::Error> for ProviderError {
    fn from(err: rcgen::Error) -> Self {
        ProviderError::system(format!("Certificate generation error: {}", err))
    }
}

impl From<sea_orm::DbErr> for ProviderError {
    fn from(err: sea_orm::DbErr) -> Self {
        ProviderError::system(format!("Database error: {}", err))
    }
}

impl From<KeyStoreError> for ProviderError {
    fn from(err: KeyStoreError) -> Self {
        ProviderError::system(format!("Key store error: {}", err))
    }
}

/// Errors that end a batch, or keep one from starting.
#[derive(Error, Debug)]
pub enum RenewalError {
    #[error("scanning renewal candidates: {0}")]
    Store(#[from] ScanError),

    #[error("{xml_id} version {version}: {source}")]
    MalformedCertificate {
        xml_id: String,
        version: i64,
        #[source]
        source: CertificateParseError,
    },

    #[error("a certificate renewal batch is already running")]
    BatchInProgress,

    #[error("no certificate renewal batch is running")]
    NoBatchRunning,

    #[error("renewal task failed: {0}")]
    Task(String),
}

impl From<RenewalError> for Problem {
    fn from(error: RenewalError) -> Self {
        match error {
            RenewalError::BatchInProgress => conflict()
                .title("Renewal Already Running")
                .detail(error.to_string())
                .build(),
            RenewalError::NoBatchRunning => not_found()
                .title("No Renewal Running")
                .detail(error.to_string())
                .build(),
            RenewalError::Store(_) => internal_server_error()
                .title("Candidate Scan Failed")
                .detail(error.to_string())
                .build(),
            RenewalError::MalformedCertificate { .. } | RenewalError::Task(_) => {
                internal_server_error().detail(error.to_string()).build()
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Missing candidate scanner")]
    MissingScanner,

    #[error("Missing renewal orchestrator")]
    MissingOrchestrator,
}
