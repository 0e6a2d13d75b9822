//! Decoding of stored certificate text and extraction of its not-after time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use cdn_core::UtcDateTime;
use chrono::{DateTime, Duration};

use super::errors::CertificateParseError;

/// Decodes the base64 text held in a key bundle. Line breaks are ignored.
pub fn decode_certificate(encoded: &str) -> Result<Vec<u8>, CertificateParseError> {
    let compact: String = encoded.split_whitespace().collect();
    if compact.is_empty() {
        return Err(CertificateParseError::Decode(
            "certificate field is empty".to_string(),
        ));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CertificateParseError::Decode(e.to_string()))
}

/// Returns the not-after time of the first certificate in `certificate`,
/// which may be PEM (a chain is fine) or raw DER.
pub fn parse_expiration(certificate: &[u8]) -> Result<UtcDateTime, CertificateParseError> {
    let not_after = if certificate.starts_with(b"-----BEGIN") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(certificate).map_err(|e| {
            CertificateParseError::MalformedCertificate(format!("Failed to parse PEM: {}", e))
        })?;
        let x509 = pem.parse_x509().map_err(|e| {
            CertificateParseError::MalformedCertificate(format!("Failed to parse X509: {}", e))
        })?;
        x509.validity().not_after.timestamp()
    } else {
        let (_, x509) = x509_parser::parse_x509_certificate(certificate).map_err(|e| {
            CertificateParseError::MalformedCertificate(format!("Failed to parse X509: {}", e))
        })?;
        x509.validity().not_after.timestamp()
    };

    DateTime::from_timestamp(not_after, 0).ok_or_else(|| {
        CertificateParseError::MalformedCertificate("Invalid expiration timestamp".to_string())
    })
}

/// A certificate is due once it expires at or before `now + window`.
pub fn needs_renewal(expiration: UtcDateTime, now: UtcDateTime, window: Duration) -> bool {
    expiration <= now + window
}
